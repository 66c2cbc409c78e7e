//! Virtual style module ids.
//!
//! Each style block is exposed to the host bundler as a module whose id
//! encodes the owning file and how the block must be compiled:
//!
//! ```text
//! /src/Card.vue?kirie&type=style&index=0&scoped=data-v-1a2b3c4d&module=$style&lang.scss
//! ```
//!
//! The trailing `lang.<ext>` segment lets the host pick its preprocessor
//! pipeline from the id alone.

/// Query marker identifying ids minted by this crate.
pub const QUERY_MARKER: &str = "kirie";

/// A decoded virtual style request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRequest {
    /// Owning component file
    pub filename: String,
    /// Position of the block among the file's style blocks
    pub index: usize,
    /// Scope id when the block is scoped
    pub scoped: Option<String>,
    /// Module name when the block is a CSS module
    pub module: Option<String>,
    pub lang: String,
}

impl StyleRequest {
    /// Encode the request as a module id.
    pub fn to_id(&self) -> String {
        let mut id = String::with_capacity(self.filename.len() + 64);
        id.push_str(&self.filename);
        id.push('?');
        id.push_str(QUERY_MARKER);
        id.push_str("&type=style&index=");
        id.push_str(&self.index.to_string());
        if let Some(scope_id) = &self.scoped {
            id.push_str("&scoped=");
            id.push_str(scope_id);
        }
        if let Some(module) = &self.module {
            id.push_str("&module=");
            id.push_str(module);
        }
        id.push_str("&lang.");
        id.push_str(&self.lang);
        id
    }

    /// Decode a module id produced by [`StyleRequest::to_id`].
    ///
    /// Returns `None` for anything that is not a virtual style request.
    pub fn parse(id: &str) -> Option<Self> {
        let (filename, query) = id.split_once('?')?;
        let mut params = query.split('&');
        if params.next()? != QUERY_MARKER {
            return None;
        }

        let mut is_style = false;
        let mut index = None;
        let mut scoped = None;
        let mut module = None;
        let mut lang = None;

        for param in params {
            if let Some(ext) = param.strip_prefix("lang.") {
                lang = Some(ext.to_string());
                continue;
            }
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            match key {
                "type" => is_style = value == "style",
                "index" => index = value.parse().ok(),
                "scoped" => scoped = Some(value.to_string()),
                "module" => {
                    module = Some(if value.is_empty() {
                        "$style".to_string()
                    } else {
                        value.to_string()
                    })
                }
                _ => {}
            }
        }

        if !is_style || filename.is_empty() {
            return None;
        }

        Some(Self {
            filename: filename.to_string(),
            index: index?,
            scoped,
            module,
            lang: lang.unwrap_or_else(|| "css".to_string()),
        })
    }
}

/// Whether `id` carries the virtual-module query marker.
pub fn is_virtual_request(id: &str) -> bool {
    id.split_once('?')
        .is_some_and(|(_, query)| query.split('&').next() == Some(QUERY_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scoped_module() {
        let request = StyleRequest {
            filename: "/src/Card.vue".into(),
            index: 1,
            scoped: Some("data-v-1a2b3c4d".into()),
            module: Some("$style".into()),
            lang: "scss".into(),
        };
        assert_eq!(
            request.to_id(),
            "/src/Card.vue?kirie&type=style&index=1&scoped=data-v-1a2b3c4d&module=$style&lang.scss"
        );
        assert_eq!(StyleRequest::parse(&request.to_id()), Some(request));
    }

    #[test]
    fn test_plain_block() {
        let request = StyleRequest::parse("/a/B.vue?kirie&type=style&index=0&lang.css").unwrap();
        assert_eq!(request.filename, "/a/B.vue");
        assert_eq!(request.index, 0);
        assert!(request.scoped.is_none());
        assert!(request.module.is_none());
        assert_eq!(request.lang, "css");
    }

    #[test]
    fn test_bare_module_flag() {
        let request = StyleRequest::parse("/a/B.vue?kirie&type=style&index=2&module&lang.less").unwrap();
        assert_eq!(request.module.as_deref(), Some("$style"));
    }

    #[test]
    fn test_rejects_foreign_ids() {
        assert!(StyleRequest::parse("/a/B.vue").is_none());
        assert!(StyleRequest::parse("/a/B.vue?vue&type=style&index=0").is_none());
        assert!(StyleRequest::parse("/a/B.vue?kirie&type=template").is_none());
        assert!(StyleRequest::parse("/a/B.vue?kirie&type=style").is_none());
        assert!(is_virtual_request("/a/B.vue?kirie&type=style&index=0&lang.css"));
        assert!(!is_virtual_request("/a/B.vue?raw"));
    }
}
