//! WebSocket live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the live reload WebSocket endpoint.
pub const SOCKET_PATH: &str = "/__livereload";

/// Path of the client script injected into served pages.
pub const SCRIPT_PATH: &str = "/__livereload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload
    Reload,

    /// Re-fetch the stylesheet served at `path` without reloading the page
    InjectCss { path: String },
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // No receivers just means no browser is connected yet
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Get the number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// The `<script>` tag injected into HTML responses.
pub fn script_tag() -> String {
    format!(r#"<script src="{}"></script>"#, SCRIPT_PATH)
}

/// Insert the client script before the last `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = script_tag();
    let lower = html.to_ascii_lowercase();

    match lower.rfind("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..index]);
            out.push_str(&tag);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{}{}", html, tag),
    }
}

/// Generate the client-side live reload script.
///
/// With `notify` set, a short banner is shown on connect and before each
/// refresh.
pub fn client_script(notify: bool) -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const notify = {notify};
  const scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  function banner(text) {{
    if (!notify) return;
    const el = document.createElement('div');
    el.textContent = text;
    el.style.cssText = 'position:fixed;top:0;right:0;z-index:2147483647;padding:6px 12px;' +
      'background:#1b1b1b;color:#fff;font:13px system-ui,sans-serif;border-bottom-left-radius:4px';
    document.body.appendChild(el);
    setTimeout(function() {{ el.remove(); }}, 1500);
  }}

  function refreshStyles(path) {{
    const links = Array.from(document.querySelectorAll('link[rel="stylesheet"]'));
    const matching = links.filter(function(link) {{
      return new URL(link.href, location.href).pathname === path;
    }});

    // Fall back to every stylesheet when none is served from `path`
    (matching.length ? matching : links).forEach(function(link) {{
      const url = new URL(link.href, location.href);
      url.searchParams.set('livereload', Date.now());
      link.href = url.toString();
    }});
  }}

  function connect() {{
    const ws = new WebSocket(scheme + location.host + '{socket}');

    ws.onopen = function() {{
      reconnectAttempts = 0;
    }};

    ws.onmessage = function(event) {{
      const msg = JSON.parse(event.data);

      switch (msg.type) {{
        case 'connected':
          console.log('[livereload] Connected');
          banner('Connected to lathe');
          break;

        case 'reload':
          banner('Reloading');
          location.reload();
          break;

        case 'inject_css':
          banner('Injected CSS');
          refreshStyles(msg.path);
          break;
      }}
    }};

    ws.onclose = function() {{
      if (reconnectAttempts < maxReconnectAttempts) {{
        reconnectAttempts++;
        setTimeout(connect, 1000 * reconnectAttempts);
      }}
    }};

    ws.onerror = function(e) {{
      console.error('[livereload] WebSocket error:', e);
    }};
  }}

  connect();
}})();
"#,
        notify = notify,
        socket = SOCKET_PATH,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_broadcasts_messages() {
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();

        let msg = ReloadMessage::InjectCss {
            path: "/style.css".to_string(),
        };
        hub.send(msg.clone());

        assert_eq!(rx.try_recv().unwrap(), msg);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn sending_without_clients_is_harmless() {
        ReloadHub::new().send(ReloadMessage::Reload);
    }

    #[test]
    fn serializes_messages() {
        assert_eq!(
            serde_json::to_string(&ReloadMessage::Reload).unwrap(),
            r#"{"type":"reload"}"#
        );
        assert_eq!(
            serde_json::to_string(&ReloadMessage::InjectCss {
                path: "/style.css".to_string()
            })
            .unwrap(),
            r#"{"type":"inject_css","path":"/style.css"}"#
        );
    }

    #[test]
    fn injects_before_closing_body() {
        let html = "<html><BODY><p>x</p></BODY></html>";

        assert_eq!(
            inject_client(html),
            r#"<html><BODY><p>x</p><script src="/__livereload.js"></script></BODY></html>"#
        );
    }

    #[test]
    fn appends_without_body() {
        assert_eq!(
            inject_client("<p>x</p>"),
            r#"<p>x</p><script src="/__livereload.js"></script>"#
        );
    }

    #[test]
    fn script_honours_notify_flag() {
        assert!(client_script(true).contains("const notify = true;"));
        assert!(client_script(false).contains("const notify = false;"));
        assert!(client_script(true).contains("/__livereload"));
    }
}
