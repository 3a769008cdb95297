pub mod cache;
pub mod classfile;
pub mod descriptor;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::inner::InnerClassHierarchy;
use crate::core::usesite::{SiteKind, UseKind, UseSite};
use descriptor::{FieldType, MethodDescriptor};

pub use classfile::{parse_class, ClassParseError};

bitflags! {
    /// Access flags as they appear on classes, inner-class entries, fields and methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const BRIDGE = 0x0040;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

impl AccessFlags {
    /// Public or protected, and not compiler generated.
    pub fn is_accessible(self) -> bool {
        self.intersects(AccessFlags::PUBLIC | AccessFlags::PROTECTED)
            && !self.contains(AccessFlags::SYNTHETIC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberSignature {
    Field(FieldType),
    Method(MethodDescriptor),
}

/// A declared field or method. Synthetic and bridge members never get this far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFacts {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub signature: MemberSignature,
    pub exceptions: Vec<String>,
    pub annotations: Vec<String>,
    pub parameter_annotations: Vec<Vec<String>>,
}

impl MemberFacts {
    pub fn is_accessible(&self) -> bool {
        self.access.is_accessible()
    }
}

/// One row of the `InnerClasses` attribute, names in internal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerClassEntry {
    pub inner_class: String,
    pub outer_class: Option<String>,
    pub simple_name: Option<String>,
    pub access: AccessFlags,
}

/// Everything the API model needs to know about one class file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFacts {
    pub internal_name: String,
    pub binary_name: String,
    pub access: AccessFlags,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberFacts>,
    pub methods: Vec<MemberFacts>,
    pub annotations: Vec<String>,
    pub inner_classes: Vec<InnerClassEntry>,
    pub enclosing_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedUse {
    pub used_type: String,
    pub site: UseSite,
}

impl ClassFacts {
    /// The `InnerClasses` row describing this class itself, if it is nested.
    pub fn self_entry(&self) -> Option<&InnerClassEntry> {
        self.inner_classes
            .iter()
            .find(|entry| entry.inner_class == self.internal_name)
    }

    pub fn is_inner(&self) -> bool {
        self.self_entry().is_some()
    }

    /// Access as declared in source. Nested classes carry their real modifiers
    /// on their own `InnerClasses` row; the class header only says public or package.
    pub fn effective_access(&self) -> AccessFlags {
        match self.self_entry() {
            Some(entry) => entry.access | (self.access & AccessFlags::SYNTHETIC),
            None => self.access,
        }
    }

    pub fn is_accessible(&self) -> bool {
        self.effective_access().is_accessible()
    }

    fn is_non_static_inner(&self) -> bool {
        self.self_entry()
            .is_some_and(|entry| !entry.access.contains(AccessFlags::STATIC))
    }

    /// Pairs naming this class or one of its transitive owners.
    pub fn hierarchy(&self) -> InnerClassHierarchy {
        let mut hierarchy = InnerClassHierarchy::new();
        for entry in &self.inner_classes {
            if entry.inner_class == self.internal_name
                || encloses(&entry.inner_class, &self.internal_name)
            {
                hierarchy.add_name(entry.outer_class.as_deref(), entry.simple_name.as_deref());
            }
        }
        hierarchy
    }

    /// Use edges contributed by this class and its accessible members.
    pub fn reported_uses(&self) -> Vec<ReportedUse> {
        let mut uses = Vec::new();
        let owner = self.binary_name.as_str();

        if let Some(super_name) = &self.super_name {
            report(
                &mut uses,
                Some(super_name),
                UseSite::new(UseKind::IsInherited, SiteKind::Class, owner),
            );
        }
        for interface in &self.interfaces {
            report(
                &mut uses,
                Some(interface),
                UseSite::new(UseKind::IsImplemented, SiteKind::Class, owner),
            );
        }
        for annotation in &self.annotations {
            report(
                &mut uses,
                Some(annotation),
                UseSite::new(UseKind::Annotates, SiteKind::Class, owner),
            );
        }

        for field in self.fields.iter().filter(|f| f.is_accessible()) {
            let site = UseSite::new(UseKind::HasType, SiteKind::Field, owner)
                .with_member(&field.name, &field.descriptor);
            if let MemberSignature::Field(ty) = &field.signature {
                report(&mut uses, ty.referenced_type(), site.clone());
            }
            for annotation in &field.annotations {
                report(
                    &mut uses,
                    Some(annotation),
                    site.clone().with_kind(UseKind::Annotates),
                );
            }
        }

        for method in self.methods.iter().filter(|m| m.is_accessible()) {
            let site = UseSite::new(UseKind::ReturnType, SiteKind::Method, owner)
                .with_member(&method.name, &method.descriptor);

            if let MemberSignature::Method(descriptor) = &method.signature {
                if let Some(return_type) = &descriptor.return_type {
                    report(&mut uses, return_type.referenced_type(), site.clone());
                }

                let skip = usize::from(method.name == "<init>" && self.is_non_static_inner());
                for (position, parameter) in descriptor.parameters.iter().enumerate().skip(skip) {
                    report(
                        &mut uses,
                        parameter.referenced_type(),
                        site.clone()
                            .with_kind(UseKind::ParameterType)
                            .at_parameter(position),
                    );
                }
            }

            for exception in &method.exceptions {
                report(
                    &mut uses,
                    Some(exception),
                    site.clone().with_kind(UseKind::IsThrown),
                );
            }
            for annotation in &method.annotations {
                report(
                    &mut uses,
                    Some(annotation),
                    site.clone().with_kind(UseKind::Annotates),
                );
            }
            for (position, annotations) in method.parameter_annotations.iter().enumerate() {
                for annotation in annotations {
                    report(
                        &mut uses,
                        Some(annotation),
                        site.clone()
                            .with_kind(UseKind::Annotates)
                            .at_parameter(position),
                    );
                }
            }
        }

        uses
    }
}

fn report(uses: &mut Vec<ReportedUse>, used_type: Option<&str>, site: UseSite) {
    if let Some(used_type) = used_type {
        uses.push(ReportedUse {
            used_type: used_type.to_string(),
            site,
        });
    }
}

/// Whether `owner` is a (transitive) enclosing class of `nested`, judged by `$` naming.
fn encloses(owner: &str, nested: &str) -> bool {
    nested.len() > owner.len()
        && nested.starts_with(owner)
        && nested.as_bytes()[owner.len()] == b'$'
}
