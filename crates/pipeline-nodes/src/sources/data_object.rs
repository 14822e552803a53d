//! Data Object Source
//!
//! Publishes a data object supplied by the host, e.g. one produced by a
//! reader outside the pipeline.

use parking_lot::RwLock;
use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, DataObject, ExecuteContext, Node,
    NodeCategory, PortInformation, PortMetadata, Result,
};

/// Data Object Source
///
/// The source keeps its own deep copy of the host's object, so writes
/// through the host's arrays never reach it. The only way to change what it
/// publishes is [`set_source_data`], which also invalidates the node.
#[derive(Debug, Default)]
pub struct DataObjectSource {
    data: RwLock<DataObject>,
}

impl DataObjectSource {
    pub const PORT_OUTPUT: &'static str = "output";

    pub fn new(data: DataObject) -> Self {
        Self {
            data: RwLock::new(data.deep_copy()),
        }
    }

    /// Copy of the object that will be published
    pub fn data(&self) -> DataObject {
        self.data.read().deep_copy()
    }
}

/// Replace the object a source node publishes and invalidate the node
pub fn set_source_data(node: &Node<DataObjectSource>, data: DataObject) {
    *node.algorithm().data.write() = data.deep_copy();
    node.mark_modified();
}

impl AlgorithmDescriptor for DataObjectSource {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "data-object-source",
            NodeCategory::Source,
            "Data Object",
            "Publishes a host-supplied data object",
        )
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: DataObjectSource::descriptor,
    create: pipeline_engine::create_node::<DataObjectSource>,
});

impl Algorithm for DataObjectSource {
    type Params = ();

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        _params: &(),
        _inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        Ok(vec![PortInformation::describe(&self.data.read())])
    }

    fn execute(&self, _params: &(), _ctx: &ExecuteContext<'_>) -> Result<Vec<DataObject>> {
        Ok(vec![self.data.read().deep_copy()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_engine::{Association, AttributeArray, ExecutiveState, Geometry};

    fn points(values: Vec<f64>) -> DataObject {
        let mut data = DataObject::new(Geometry::PointSet {
            points: vec![[0.0; 3]; values.len()],
        });
        data.add_scalars(Association::Point, AttributeArray::scalars("s", values))
            .unwrap();
        data
    }

    #[test]
    fn test_host_copy_stays_writable() {
        let data = points(vec![1.0, 2.0]);
        let node = Node::new("src", DataObjectSource::new(data.shallow_copy()), ());
        let published = node.output_data(0).unwrap();

        assert_eq!(published, data);
        assert!(published.array("s", Association::Point).unwrap().is_read_only());
        data.array("s", Association::Point)
            .unwrap()
            .set_value(0, 0, 5.0)
            .unwrap();
        assert_eq!(published.range("s"), Some([1.0, 2.0]));
    }

    #[test]
    fn test_host_writes_do_not_reach_published_data() {
        let data = points(vec![1.0, 2.0, 6.0, 7.0]);
        let node = Node::new("src", DataObjectSource::new(data.shallow_copy()), ());
        node.update().unwrap();

        data.array("s", Association::Point)
            .unwrap()
            .set_value(0, 0, 9.0)
            .unwrap();
        node.algorithm()
            .data()
            .array("s", Association::Point)
            .unwrap()
            .set_value(1, 0, 9.0)
            .unwrap();
        assert_eq!(node.state(), ExecutiveState::Valid);
        assert_eq!(node.algorithm().data().range("s"), Some([1.0, 7.0]));

        set_source_data(&node, data.shallow_copy());
        assert_eq!(node.state(), ExecutiveState::Stale);
        assert_eq!(node.output_data(0).unwrap().range("s"), Some([2.0, 9.0]));
        assert_eq!(node.execution_count(), 2);
    }

    #[test]
    fn test_replacing_data_invalidates() {
        let node = Node::new("src", DataObjectSource::new(points(vec![1.0])), ());
        node.update().unwrap();
        assert_eq!(node.state(), ExecutiveState::Valid);

        set_source_data(&node, points(vec![3.0, 4.0]));
        assert_eq!(node.state(), ExecutiveState::Stale);
        assert_eq!(node.output_data(0).unwrap().point_count(), 2);
        assert_eq!(node.execution_count(), 2);
        assert_eq!(node.algorithm().data().point_count(), 2);
    }

    #[test]
    fn test_information_describes_data() {
        let node = Node::new("src", DataObjectSource::new(points(vec![1.0, 2.0, 3.0])), ());
        let info = node.output_port(0).unwrap().information().unwrap();
        assert!(info.has_array("s", Association::Point));
        assert_eq!(node.execution_count(), 0);
    }
}
