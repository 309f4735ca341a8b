use axum::response::Html;

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Images to PDF</title>
  <link rel="stylesheet" href="/styles.css">
</head>
<body>
  <main>
    <h1>Images to PDF</h1>
    <p>Pick one or more JPG or PNG files. Each image becomes one page, in the order selected.</p>
    <form action="/convert" method="post" enctype="multipart/form-data">
      <input type="file" name="images" accept=".jpg,.jpeg,.png,image/jpeg,image/png" multiple required>
      <button type="submit">Convert</button>
    </form>
  </main>
</body>
</html>
"#;

pub async fn index_handler() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}
