use crate::options::{DataLayoutOption, TraversalOption};
use crate::{Error, PairwiseFunctor};

use super::cell_functor::CellFunctor;
use super::{Traversal, TraversalTarget, wrong_target};

/// Sequential traversal of the direct sum container: every pair of owned
/// particles, and every pair of an owned and a halo particle.
#[derive(Debug, Clone)]
pub struct DirectSumTraversal {
    data_layout: DataLayoutOption,
    newton3: bool,
    applicable: bool,
}

impl DirectSumTraversal {
    pub fn new(data_layout: DataLayoutOption, newton3: bool, applicable: bool) -> DirectSumTraversal {
        DirectSumTraversal { data_layout, newton3, applicable }
    }
}

impl Traversal for DirectSumTraversal {
    fn option(&self) -> TraversalOption {
        TraversalOption::DsSequential
    }

    fn data_layout(&self) -> DataLayoutOption {
        self.data_layout
    }

    fn use_newton3(&self) -> bool {
        self.newton3
    }

    fn is_applicable(&self) -> bool {
        self.applicable
    }

    #[time_graph::instrument(name = "DirectSumTraversal::traverse")]
    fn traverse(&self, target: TraversalTarget<'_>, functor: &dyn PairwiseFunctor) -> Result<(), Error> {
        let (owned, halo) = match target {
            TraversalTarget::DirectSum { owned, halo } => (owned, halo),
            target => return Err(wrong_target(self.option(), &target)),
        };

        let cell_functor = CellFunctor::new(functor, self.data_layout, self.newton3)?;
        cell_functor.process_cell(owned);
        if self.newton3 {
            cell_functor.process_pair(owned, halo);
        } else {
            cell_functor.process_pair_one_way(owned, halo);
        }

        return Ok(());
    }
}
