//! gatebridge/src/namespace.rs
//! The lazy package → class → instance traversal (spec §4.E).

use crate::client::Client;
use crate::error::GateError;
use crate::proxy::{ClassProxy, PackageOrClass, PackageProxy, starts_upper};
use crate::types::TargetId;
use dashmap::DashMap;
use std::sync::Arc;

/// Holds a view id (default `rj`), a client reference, and a mapping from
/// short name to fully-qualified class name populated by imports (spec §3
/// "Namespace view").
#[derive(Clone)]
pub struct NamespaceView {
    view_id: TargetId,
    client: Client,
    imports: Arc<DashMap<String, String>>,
}

impl NamespaceView {
    pub fn new(view_id: TargetId, client: Client) -> Self {
        NamespaceView {
            view_id,
            client,
            imports: Arc::new(DashMap::new()),
        }
    }

    pub fn view_id(&self) -> &TargetId {
        &self.view_id
    }

    /// Property access resolution (spec §4.E): an import shortcut wins
    /// first, then the upper/lower-case convention, matching the same
    /// promotion rule a package proxy applies to its own children.
    pub fn prop(&self, name: &str) -> PackageOrClass {
        if let Some(fqn) = self.imports.get(name) {
            return PackageOrClass::Class(ClassProxy::new(fqn.clone(), self.client.clone()));
        }
        if starts_upper(name) {
            PackageOrClass::Class(ClassProxy::new(name, self.client.clone()))
        } else {
            PackageOrClass::Package(PackageProxy::new(name, self.client.clone()))
        }
    }

    /// `j\ni\n<viewId>\n<fqn>\n e\n`. On success, registers
    /// `lastDotSegment(fqn) → fqn` in the shortcut map unless the last
    /// segment is `*` (spec §4.E).
    pub async fn java_import(&self, fqn: &str) -> Result<(), GateError> {
        self.client.java_import(&self.view_id, fqn).await?;
        if let Some(last) = fqn.rsplit('.').next() {
            if last != "*" {
                self.imports.insert(last.to_string(), fqn.to_string());
            }
        }
        Ok(())
    }

    /// `j\nr\n<viewId>\n<fqn>\n e\n`, symmetric with `java_import` (spec §4.E).
    pub async fn remove_import(&self, fqn: &str) -> Result<(), GateError> {
        self.client.remove_import(&self.view_id, fqn).await?;
        if let Some(last) = fqn.rsplit('.').next() {
            self.imports.remove(last);
        }
        Ok(())
    }

    pub fn then(&self) -> Option<crate::proxy::MaterializedValue> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;

    fn test_client() -> Client {
        Client::new(GateConfig::default())
    }

    #[test]
    fn uppercase_prop_without_import_is_class() {
        let view = NamespaceView::new(TargetId::default_view(), test_client());
        match view.prop("Foo") {
            PackageOrClass::Class(c) => assert_eq!(c.fqn, "Foo"),
            _ => panic!("expected class"),
        }
    }

    #[test]
    fn lowercase_prop_without_import_is_package() {
        let view = NamespaceView::new(TargetId::default_view(), test_client());
        match view.prop("java") {
            PackageOrClass::Package(p) => assert_eq!(p.path, "java"),
            _ => panic!("expected package"),
        }
    }
}
