use gigboard_client_core::{ErrorSink, Role};
use wasm_bindgen::JsValue;

use crate::indicators::BusyIndicator;
use crate::pages::{Page, PageRenderer};

const PRELOADER_ID: &str = "preloader";
const ERROR_CONTAINER_ID: &str = "error-message";
const HIDDEN_CLASS: &str = "hidden";

fn element_by_id(id: &str) -> Option<web_sys::Element> {
    web_sys::window()?.document()?.get_element_by_id(id)
}

/// Toggles the `hidden` class on `#preloader`.
pub(super) struct PreloaderIndicator;

impl BusyIndicator for PreloaderIndicator {
    fn show(&self) {
        if let Some(preloader) = element_by_id(PRELOADER_ID) {
            let _ = preloader.class_list().remove_1(HIDDEN_CLASS);
        }
    }

    fn hide(&self) {
        if let Some(preloader) = element_by_id(PRELOADER_ID) {
            let _ = preloader.class_list().add_1(HIDDEN_CLASS);
        }
    }
}

/// Dismissible alert in `#error-message`.
pub(super) struct AlertErrorSink;

impl ErrorSink for AlertErrorSink {
    fn notify(&self, message: &str) {
        let Some(container) = element_by_id(ERROR_CONTAINER_ID) else {
            tracing::warn!(%message, "Error container missing");
            return;
        };
        container.set_inner_html(&format!(
            "<div class=\"alert alert-danger alert-dismissible fade show\" role=\"alert\">{}\
             <button type=\"button\" class=\"btn-close\" data-bs-dismiss=\"alert\" aria-label=\"Close\"></button></div>",
            escape_html(message)
        ));
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Hands `(role, page)` to a JS view function.
pub(super) struct CallbackRenderer {
    render: js_sys::Function,
}

impl CallbackRenderer {
    pub(super) fn new(render: js_sys::Function) -> Self {
        Self { render }
    }
}

impl PageRenderer for CallbackRenderer {
    fn render(&self, role: Role, page: Page) -> anyhow::Result<()> {
        let page = serde_json::to_string(&page)?;
        let page = js_sys::JSON::parse(&page)
            .map_err(|error| anyhow::anyhow!("invalid page descriptor: {error:?}"))?;
        self.render
            .call2(&JsValue::NULL, &JsValue::from_str(role.as_str()), &page)
            .map_err(|error| anyhow::anyhow!("page renderer threw: {error:?}"))?;
        Ok(())
    }
}
