use axum::{
    body::Body,
    http::{header, Response, StatusCode},
};

/// Landing page showing the live stream
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="https://stackpath.bootstrapcdn.com/bootstrap/4.1.3/css/bootstrap.min.css" integrity="sha384-MCw98/SFnGE8fJT3GXwEOngsV7Zt27NXFoaoApmYm81iuXoPkFOJwJ8ERdknLPMO" crossorigin="anonymous">
    <title>camstream</title>
  </head>
  <body>
    <div class="container">
      <div class="row">
        <div class="col-lg-8 offset-lg-2">
          <h3 class="mt-5">Live Streaming</h3>
          <img src="/stream" width="100%">
        </div>
      </div>
    </div>
  </body>
</html>
"#;

/// Serve the landing page
pub async fn index_handler() -> Response<Body> {
    let mut response = Response::new(Body::from(INDEX_HTML));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_embeds_stream() {
        assert!(INDEX_HTML.contains(r#"<img src="/stream""#));
    }

    #[tokio::test]
    async fn test_index_response() {
        let response = index_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
    }
}
