//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Messages sent to browsers for live reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Swap a style sheet in place
    Css {
        /// URL path of the rewritten style sheet
        path: String,
    },

    /// Show a short banner
    Notify {
        /// Banner text
        message: String,
    },
}

impl ReloadMessage {
    /// JSON text frame for this message.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Hub for broadcasting reload messages to all connected browsers.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected browsers.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is open
        let _ = self.sender.send(msg);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Number of connected browsers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert `tag` before the last `</body>`, or append it when there is none.
pub fn inject_script(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();

    match lower.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..index]);
            out.push_str(tag);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Client-side live reload script, connecting back to `ws_path` on the
/// serving host.
pub fn livereload_client_script(ws_path: &str) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  var scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  var ws = new WebSocket(scheme + location.host + '{}');
  var reconnectAttempts = 0;
  var maxReconnectAttempts = 10;

  function swapStylesheet(path) {{
    var swapped = false;
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    for (var i = 0; i < links.length; i++) {{
      var url = new URL(links[i].href, location.href);
      if (url.pathname === path) {{
        url.searchParams.set('livereload', Date.now());
        links[i].href = url.toString();
        swapped = true;
      }}
    }}
    return swapped;
  }}

  function showBanner(message) {{
    var banner = document.createElement('div');
    banner.textContent = message;
    banner.style.cssText = 'position:fixed;top:8px;right:8px;z-index:2147483647;' +
      'padding:6px 12px;background:#222;color:#fff;font:12px/1.4 sans-serif;' +
      'border-radius:4px;opacity:.9';
    document.body.appendChild(banner);
    setTimeout(function() {{ banner.remove(); }}, 2500);
  }}

  ws.onopen = function() {{
    console.log('[livereload] Connected');
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    var msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        location.reload();
        break;

      case 'css':
        if (!swapStylesheet(msg.path)) {{
          location.reload();
        }}
        break;

      case 'notify':
        showBanner(msg.message);
        break;

      case 'connected':
        console.log('[livereload] Server acknowledged connection');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[livereload] Disconnected');
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{
        location.reload();
      }}, 1000 * reconnectAttempts);
    }}
  }};
}})();
"#,
        ws_path
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        hub.send(ReloadMessage::Reload);

        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn send_without_browsers_is_ignored() {
        let hub = ReloadHub::new();
        hub.send(ReloadMessage::Connected);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn serializes_tagged_messages() {
        let css = ReloadMessage::Css {
            path: "/assets/css/styles.css".to_string(),
        };

        assert_eq!(
            css.to_json().unwrap(),
            r#"{"type":"css","path":"/assets/css/styles.css"}"#
        );
        assert_eq!(ReloadMessage::Reload.to_json().unwrap(), r#"{"type":"reload"}"#);
    }

    #[test]
    fn injects_before_closing_body() {
        let html = "<html><body><p>hi</p></BODY></html>";

        assert_eq!(
            inject_script(html, "<script></script>"),
            "<html><body><p>hi</p><script></script></BODY></html>"
        );
    }

    #[test]
    fn appends_when_body_is_missing() {
        assert_eq!(inject_script("<p>x</p>", "<s/>"), "<p>x</p><s/>");
    }

    #[test]
    fn client_script_targets_endpoint() {
        let script = livereload_client_script("/__livereload");

        assert!(script.contains("location.host + '/__livereload'"));
        assert!(script.contains("case 'css'"));
    }
}
