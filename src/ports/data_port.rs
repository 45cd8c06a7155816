//! Observation source port trait.

use crate::domain::error::CusumError;
use crate::domain::observation::Observation;

pub trait DataPort {
    /// All observations, ordered by `open_time` ascending.
    fn fetch_observations(&self) -> Result<Vec<Observation>, CusumError>;

    /// Human-readable name of the source, used in logs and errors.
    fn source_name(&self) -> String;
}
