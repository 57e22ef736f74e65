pub mod cms;
pub mod cms_concurrent;
pub mod framework;
pub mod par_old;
pub mod parallel;
pub mod simple;
pub mod verbose;

pub use cms::CmsMatcher;
pub use cms_concurrent::CmsConcurrentMatcher;
pub use framework::FrameworkMatcher;
pub use par_old::CompactionPhaseMatcher;
pub use parallel::ParallelMatcher;
pub use simple::{split_camel_case, SimpleMatcher};
pub use verbose::VerboseMatcher;

use super::traits::LineMatcher;
use crate::conf::EngineConfig;
use crate::error::Result;

/// Every known grammar in its initial priority order.
pub fn standard_matchers(config: &EngineConfig) -> Result<Vec<Box<dyn LineMatcher>>> {
    let mut matchers: Vec<Box<dyn LineMatcher>> = vec![
        Box::new(FrameworkMatcher::new()?),
        Box::new(CmsMatcher::new()?),
        Box::new(CmsConcurrentMatcher::new()?),
    ];
    if config.compaction_phases {
        for m in CompactionPhaseMatcher::all()? {
            matchers.push(Box::new(m));
        }
    }
    matchers.push(Box::new(ParallelMatcher::new()?));
    matchers.push(Box::new(VerboseMatcher::new()?));
    matchers.push(Box::new(SimpleMatcher::new()?));
    Ok(matchers)
}
