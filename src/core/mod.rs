pub mod analyzer;
pub mod archive;
pub mod assembler;
pub mod filter;
pub mod graph;
pub mod inner;
pub mod scanner;
pub mod tree;
pub mod usesite;

pub use analyzer::{AnalysisError, ApiAnalyzer, ApiArchives};
pub use archive::{Archive, ArchiveFingerprint, BootstrapClasspath, FileArchive, MemoryArchive};
pub use assembler::TreeAssembler;
pub use filter::{AcceptAll, InclusionFilter, PatternFilter};
pub use graph::{CommittedType, TypeGraph, TypeId, TypeRecord, TypeState};
pub use inner::{InnerClassHierarchy, InnerClassRecord};
pub use scanner::{ArchiveScanDriver, ScanError, ScanOutcome, ScanPhase};
pub use tree::{ApiMember, ApiNode, ApiNodeKind, ApiTree, NodeId};
pub use usesite::{SiteKind, UseKind, UseSite};
