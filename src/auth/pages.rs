//! HTML pages shown in the browser tab after the callback redirect.

/// The set of pages the loopback listener can answer with. Swap these out to
/// re-skin the flow; the protocol does not depend on their content.
#[derive(Clone, Debug)]
pub struct ResponsePages {
    pub success: String,
    pub failure: String,
    pub missing_token: String,
    pub internal_error: String,
    pub not_found: String,
}

impl Default for ResponsePages {
    fn default() -> Self {
        ResponsePages {
            success: SUCCESS_PAGE.to_string(),
            failure: simple_page(
                "Authentication failed",
                "Altary reported an error. Return to your assistant and try again.",
            ),
            missing_token: simple_page(
                "Authentication data missing",
                "The login redirect did not include a token. Return to your assistant and try again.",
            ),
            internal_error: simple_page(
                "Something went wrong",
                "The local login helper could not process this request.",
            ),
            not_found: simple_page("Not found", "This helper only serves /callback."),
        }
    }
}

fn simple_page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h2>{title}</h2><p>{message}</p><script>window.close();</script></body></html>"
    )
}

// Counts down three seconds, then tries to close the tab.
const SUCCESS_PAGE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>Authenticated</title>
<style>
  body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
         display: flex; align-items: center; justify-content: center;
         min-height: 100vh; margin: 0; text-align: center;
         background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); }
  .container { background: white; padding: 2rem; border-radius: 12px; }
  .countdown { color: #667eea; font-weight: 600; }
</style>
</head>
<body>
<div class="container">
  <h2>Authentication complete</h2>
  <p>Your assistant is now connected to Altary.</p>
  <p class="countdown">This tab closes in <span id="countdown">3</span> seconds.</p>
</div>
<script>
  let remaining = 3;
  const label = document.getElementById('countdown');
  const timer = setInterval(() => {
    remaining--;
    label.textContent = remaining;
    if (remaining <= 0) {
      clearInterval(timer);
      window.close();
      setTimeout(() => {
        document.querySelector('.countdown').textContent = 'You can close this tab now.';
      }, 500);
    }
  }, 1000);
</script>
</body>
</html>
"#;
