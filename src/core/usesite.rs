use serde::{Deserialize, Serialize};
use std::fmt;

/// How one type refers to another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UseKind {
    IsInherited,
    IsImplemented,
    HasType,
    ReturnType,
    ParameterType,
    IsThrown,
    Annotates,
    Contains,
}

impl UseKind {
    /// Whether a use of this kind by an API type drags the used type into the API.
    pub fn moves_to_api(self) -> bool {
        !matches!(self, UseKind::Annotates | UseKind::Contains)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UseKind::IsInherited => "IS_INHERITED",
            UseKind::IsImplemented => "IS_IMPLEMENTED",
            UseKind::HasType => "HAS_TYPE",
            UseKind::ReturnType => "RETURN_TYPE",
            UseKind::ParameterType => "PARAMETER_TYPE",
            UseKind::IsThrown => "IS_THROWN",
            UseKind::Annotates => "ANNOTATES",
            UseKind::Contains => "CONTAINS",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteKind {
    Class,
    Field,
    Method,
    MethodParameter,
}

/// The place a type is used from: an edge weight in the type graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UseSite {
    pub use_kind: UseKind,
    pub site_kind: SiteKind,
    /// Binary name of the class declaring the site.
    pub site_owner: String,
    pub site_name: Option<String>,
    pub site_descriptor: Option<String>,
    pub site_position: Option<usize>,
}

impl UseSite {
    pub fn new(use_kind: UseKind, site_kind: SiteKind, site_owner: &str) -> Self {
        Self {
            use_kind,
            site_kind,
            site_owner: site_owner.to_string(),
            site_name: None,
            site_descriptor: None,
            site_position: None,
        }
    }

    /// The CONTAINS edge from a nested class to its owner.
    pub fn containment(inner: &str) -> Self {
        Self::new(UseKind::Contains, SiteKind::Class, inner)
    }

    pub fn with_member(mut self, name: &str, descriptor: &str) -> Self {
        self.site_name = Some(name.to_string());
        self.site_descriptor = Some(descriptor.to_string());
        self
    }

    pub fn with_kind(mut self, use_kind: UseKind) -> Self {
        self.use_kind = use_kind;
        self
    }

    pub fn at_parameter(mut self, position: usize) -> Self {
        self.site_kind = SiteKind::MethodParameter;
        self.site_position = Some(position);
        self
    }
}

impl fmt::Display for UseSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.use_kind.as_str(), self.site_owner)?;
        if let Some(name) = &self.site_name {
            write!(f, "::{}", name)?;
        }
        if let Some(descriptor) = &self.site_descriptor {
            write!(f, "{}", descriptor)?;
        }
        if let Some(position) = self.site_position {
            write!(f, " #{}", position)?;
        }
        Ok(())
    }
}
