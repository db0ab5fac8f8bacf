//! Brand profiling for a website's landing page.

pub mod analyzer;
pub mod colors;
pub mod error;
pub mod evidence;
pub mod profile;

pub use analyzer::analyze_website;
pub use colors::extract_brand_colors;
pub use error::BrandError;
pub use evidence::{extract_evidence, PageEvidence};
pub use profile::{BrandProfile, KnowledgeBase};
