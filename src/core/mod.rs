pub mod checks;
pub mod municat;
pub mod predicates;
pub mod qa;
pub mod reference;
pub mod report;
pub mod workspace;

pub use municat::MunicatGenerator;
pub use qa::QaEngine;
pub use report::ReportLog;
pub use workspace::Workspace;
