use std::sync::Arc;

use crate::catalog::FlagCatalog;
use crate::evaluation::{Clock, Evaluator, IanaZones, SystemClock};

pub type SharedEvaluator = Evaluator<Box<dyn Clock + Send + Sync>, IanaZones>;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<FlagCatalog>,
    pub evaluator: Arc<SharedEvaluator>,
}

impl AppState {
    pub fn new(catalog: FlagCatalog) -> Self {
        Self::with_clock(catalog, SystemClock)
    }

    pub fn with_clock(catalog: FlagCatalog, clock: impl Clock + Send + Sync + 'static) -> Self {
        let clock: Box<dyn Clock + Send + Sync> = Box::new(clock);
        Self {
            catalog: Arc::new(catalog),
            evaluator: Arc::new(Evaluator::with_parts(clock, IanaZones)),
        }
    }
}
