use sea_orm::sea_query::Alias;

/// Static configuration describing how a SeaORM model maps onto its
/// closure table.
#[derive(Clone, Debug)]
pub struct ClosureTreeConfig {
    entity_name: String,
    closure_table: String,
    child_attribute: String,
    parent_attribute: String,
    depth_attribute: String,
    leaf_parameter: String,
}

impl ClosureTreeConfig {
    /// Create a configuration for `entity_name` backed by `closure_table`,
    /// using the default `child`/`parent`/`depth` columns and `leaf` alias.
    pub fn new(entity_name: impl Into<String>, closure_table: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            closure_table: closure_table.into(),
            child_attribute: "child".to_string(),
            parent_attribute: "parent".to_string(),
            depth_attribute: "depth".to_string(),
            leaf_parameter: "leaf".to_string(),
        }
    }

    /// Merge options produced by [`ClosureTreeOptions`].
    pub(crate) fn apply_options(mut self, options: ClosureTreeOptions) -> Self {
        if let Some(closure_table) = options.closure_table {
            self.closure_table = closure_table;
        }
        if let Some(child) = options.child_attribute {
            self.child_attribute = child;
        }
        if let Some(parent) = options.parent_attribute {
            self.parent_attribute = parent;
        }
        if let Some(depth) = options.depth_attribute {
            self.depth_attribute = depth;
        }
        if let Some(leaf) = options.leaf_parameter {
            self.leaf_parameter = leaf;
        }
        self
    }

    /// Human-readable Rust struct name for the base entity.
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Table holding the `(parent, child, depth)` rows.
    pub fn closure_table(&self) -> &str {
        &self.closure_table
    }

    /// Closure column referencing the descendant.
    pub fn child_attribute(&self) -> &str {
        &self.child_attribute
    }

    /// Closure column referencing the ancestor.
    pub fn parent_attribute(&self) -> &str {
        &self.parent_attribute
    }

    /// Closure column storing the edge count between ancestor and descendant.
    pub fn depth_attribute(&self) -> &str {
        &self.depth_attribute
    }

    /// Alias of the derived boolean selected by [`TreeQuery::leaf`](crate::query::TreeQuery::leaf).
    pub fn leaf_parameter(&self) -> &str {
        &self.leaf_parameter
    }

    pub(crate) fn table_iden(&self) -> Alias {
        Alias::new(self.closure_table.as_str())
    }

    pub(crate) fn child_iden(&self) -> Alias {
        Alias::new(self.child_attribute.as_str())
    }

    pub(crate) fn parent_iden(&self) -> Alias {
        Alias::new(self.parent_attribute.as_str())
    }

    pub(crate) fn depth_iden(&self) -> Alias {
        Alias::new(self.depth_attribute.as_str())
    }

    pub(crate) fn leaf_iden(&self) -> Alias {
        Alias::new(self.leaf_parameter.as_str())
    }
}

/// Builder-style options consumed by the derive macro.
#[derive(Clone, Debug, Default)]
pub struct ClosureTreeOptions {
    closure_table: Option<String>,
    child_attribute: Option<String>,
    parent_attribute: Option<String>,
    depth_attribute: Option<String>,
    leaf_parameter: Option<String>,
}

impl ClosureTreeOptions {
    pub fn closure_table(mut self, value: impl Into<String>) -> Self {
        self.closure_table = Some(value.into());
        self
    }

    pub fn child_attribute(mut self, value: impl Into<String>) -> Self {
        self.child_attribute = Some(value.into());
        self
    }

    pub fn parent_attribute(mut self, value: impl Into<String>) -> Self {
        self.parent_attribute = Some(value.into());
        self
    }

    pub fn depth_attribute(mut self, value: impl Into<String>) -> Self {
        self.depth_attribute = Some(value.into());
        self
    }

    pub fn leaf_parameter(mut self, value: impl Into<String>) -> Self {
        self.leaf_parameter = Some(value.into());
        self
    }

    pub fn apply(self, base: ClosureTreeConfig) -> ClosureTreeConfig {
        base.apply_options(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_conventional_column_names() {
        let config = ClosureTreeConfig::new("Folder", "folder_tree");
        assert_eq!(config.entity_name(), "Folder");
        assert_eq!(config.closure_table(), "folder_tree");
        assert_eq!(config.child_attribute(), "child");
        assert_eq!(config.parent_attribute(), "parent");
        assert_eq!(config.depth_attribute(), "depth");
        assert_eq!(config.leaf_parameter(), "leaf");
    }

    #[test]
    fn options_override_only_what_they_set() {
        let config = ClosureTreeOptions::default()
            .child_attribute("descendant_id")
            .parent_attribute("ancestor_id")
            .apply(ClosureTreeConfig::new("Folder", "folder_tree"));

        assert_eq!(config.child_attribute(), "descendant_id");
        assert_eq!(config.parent_attribute(), "ancestor_id");
        assert_eq!(config.depth_attribute(), "depth");
        assert_eq!(config.closure_table(), "folder_tree");
    }
}
