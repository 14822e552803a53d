//! Pass Through
//!
//! Publishes its input unchanged.

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, DataObject, ExecuteContext, NodeCategory,
    PortMetadata, Result,
};

/// Pass Through
///
/// Output is a shallow copy of the input: geometry and array storage are
/// shared, which is safe because published objects are read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl PassThrough {
    pub const PORT_INPUT: &'static str = "input";
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for PassThrough {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "pass-through",
            NodeCategory::Filter,
            "Pass Through",
            "Publishes its input unchanged",
        )
        .input(PortMetadata::required(Self::PORT_INPUT, "Input"))
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: PassThrough::descriptor,
    create: pipeline_engine::create_node::<PassThrough>,
});

impl Algorithm for PassThrough {
    type Params = ();

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn execute(&self, _params: &(), ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        Ok(vec![ctx.input(0)?.shallow_copy()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PointGridSource;
    use pipeline_engine::Node;

    #[test]
    fn test_shares_storage_with_input() {
        let grid = Node::<PointGridSource>::with_defaults("grid");
        let pass = Node::new("pass", PassThrough, ());
        pass.set_input_connection(0, &grid.output_port(0).unwrap())
            .unwrap();

        let output = pass.output_data(0).unwrap();
        let input = grid.output_data(0).unwrap();
        assert_eq!(output, input);
        assert!(output.shares_geometry_with(&input));
    }

    #[test]
    fn test_information_forwarded() {
        let grid = Node::<PointGridSource>::with_defaults("grid");
        let pass = Node::new("pass", PassThrough, ());
        pass.set_input_connection(0, &grid.output_port(0).unwrap())
            .unwrap();
        assert_eq!(
            pass.output_port(0).unwrap().information().unwrap(),
            grid.output_port(0).unwrap().information().unwrap()
        );
    }
}
