use std::io::Write;

use crate::Error;

use super::Configuration;

/// Write the result of each tuning phase in CSV format: the iteration at the
/// end of the phase, the selected configuration and the time spent tuning.
pub struct TuningResultLogger {
    writer: Box<dyn Write + Send>,
}

impl std::fmt::Debug for TuningResultLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuningResultLogger").finish_non_exhaustive()
    }
}

impl TuningResultLogger {
    /// Create a new logger writing to `writer`, and write the CSV header
    pub fn new(mut writer: Box<dyn Write + Send>) -> Result<TuningResultLogger, Error> {
        writeln!(writer, "Iteration,{},tuning[ns]", Configuration::csv_header())?;
        return Ok(TuningResultLogger { writer: writer });
    }

    pub fn log_tuning_result(&mut self, configuration: &Configuration, iteration: usize, tuning_time_ns: u128) -> Result<(), Error> {
        writeln!(self.writer, "{},{},{}", iteration, configuration.csv_line(), tuning_time_ns)?;
        self.writer.flush()?;
        return Ok(());
    }
}

/// Write the predictions made at the start of each tuning phase in CSV
/// format, using `none` for configurations without prediction.
pub struct PredictionLogger {
    writer: Box<dyn Write + Send>,
}

impl std::fmt::Debug for PredictionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionLogger").finish_non_exhaustive()
    }
}

impl PredictionLogger {
    pub fn new(writer: Box<dyn Write + Send>) -> PredictionLogger {
        PredictionLogger { writer: writer }
    }

    pub fn log_predictions(&mut self, tuning_phase: usize, predictions: &[(Configuration, Option<u64>)]) -> Result<(), Error> {
        writeln!(self.writer, "Tuning phase,{},Prediction", Configuration::csv_header())?;
        for (configuration, prediction) in predictions {
            match prediction {
                Some(prediction) => writeln!(self.writer, "{},{},{}", tuning_phase, configuration.csv_line(), prediction)?,
                None => writeln!(self.writer, "{},{},none", tuning_phase, configuration.csv_line())?,
            }
        }
        self.writer.flush()?;
        return Ok(());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use crate::options::{ContainerOption, DataLayoutOption, Newton3Option, TraversalOption};

    use super::*;

    /// In-memory sink, shared with the test to inspect what was written
    #[derive(Clone, Default)]
    pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn content(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(data)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn configuration() -> Configuration {
        Configuration::new(ContainerOption::LinkedCells, TraversalOption::LcC18, DataLayoutOption::Soa, Newton3Option::Disabled, 1.0)
    }

    #[test]
    fn tuning_results() {
        let buffer = SharedBuffer::default();
        let mut logger = TuningResultLogger::new(Box::new(buffer.clone())).unwrap();
        logger.log_tuning_result(&configuration(), 42, 1234).unwrap();

        assert_eq!(buffer.content(), "\
            Iteration,Container,Traversal,Data Layout,Newton 3,Cell Size Factor,tuning[ns]\n\
            42,linked-cells,lc-c18,soa,disabled,1,1234\n"
        );
    }

    #[test]
    fn predictions() {
        let buffer = SharedBuffer::default();
        let mut logger = PredictionLogger::new(Box::new(buffer.clone()));
        let mut other = configuration();
        other.cell_size_factor = 2.0;
        logger.log_predictions(3, &[(configuration(), Some(55)), (other, None)]).unwrap();

        assert_eq!(buffer.content(), "\
            Tuning phase,Container,Traversal,Data Layout,Newton 3,Cell Size Factor,Prediction\n\
            3,linked-cells,lc-c18,soa,disabled,1,55\n\
            3,linked-cells,lc-c18,soa,disabled,2,none\n"
        );
    }
}
