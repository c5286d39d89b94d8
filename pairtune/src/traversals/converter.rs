use rayon::prelude::*;

use crate::options::DataLayoutOption;
use crate::particles::ParticleCell;
use crate::Error;

/// Converts the cells of a container between the array of structures layout
/// used for storage and the layout a traversal needs.
#[derive(Debug, Clone, Copy)]
pub struct DataLayoutConverter {
    data_layout: DataLayoutOption,
}

impl DataLayoutConverter {
    pub fn new(data_layout: DataLayoutOption) -> DataLayoutConverter {
        DataLayoutConverter { data_layout: data_layout }
    }

    /// Load the data of all `cells` in the target layout
    #[time_graph::instrument(name = "DataLayoutConverter::load_data")]
    pub fn load_data(&self, cells: &mut [ParticleCell]) -> Result<(), Error> {
        match self.data_layout {
            DataLayoutOption::Aos => Ok(()),
            DataLayoutOption::Soa => {
                cells.par_iter_mut().for_each(ParticleCell::load_soa);
                Ok(())
            }
            DataLayoutOption::Device => Err(device_unsupported()),
        }
    }

    /// Write the data back from the target layout to the particles
    #[time_graph::instrument(name = "DataLayoutConverter::store_data")]
    pub fn store_data(&self, cells: &mut [ParticleCell]) -> Result<(), Error> {
        match self.data_layout {
            DataLayoutOption::Aos => Ok(()),
            DataLayoutOption::Soa => {
                cells.par_iter_mut().for_each(ParticleCell::extract_soa);
                Ok(())
            }
            DataLayoutOption::Device => Err(device_unsupported()),
        }
    }
}

fn device_unsupported() -> Error {
    Error::Unsupported("the device data layout requires device support, which is not available in this build".into())
}

#[cfg(test)]
mod tests {
    use crate::particles::{Particle, ParticleCell};
    use crate::Vector3D;

    use super::*;

    #[test]
    fn soa_round_trip() {
        let mut cells = vec![ParticleCell::new(), ParticleCell::new()];
        cells[1].push(Particle::new(3, Vector3D::new(1.0, 2.0, 3.0)));

        let converter = DataLayoutConverter::new(DataLayoutOption::Soa);
        converter.load_data(&mut cells).unwrap();
        assert_eq!(cells[1].soa.len(), 1);
        assert!(cells[0].soa.is_empty());

        cells[1].soa.fx[0] = 6.0;
        converter.store_data(&mut cells).unwrap();
        assert!(cells[1].soa.is_empty());
        assert_eq!(cells[1].particles[0].force, Vector3D::new(6.0, 0.0, 0.0));
    }

    #[test]
    fn device() {
        let mut cells = vec![ParticleCell::new()];
        let converter = DataLayoutConverter::new(DataLayoutOption::Device);
        let error = converter.load_data(&mut cells).unwrap_err();
        assert!(matches!(error, Error::Unsupported(_)));
    }
}
