//! Time Step Source
//!
//! Oscillating point field over a uniform grid, sampled at discrete time
//! steps. Consumers pick a step with `OutputPort::set_update_time`; requests
//! between steps snap to the nearest one.

use std::f64::consts::TAU;

use pipeline_engine::{
    Algorithm, AlgorithmDescriptor, AlgorithmMetadata, ArrayInfo, Association, AttributeArray,
    DataKind, DataObject, ExecuteContext, Geometry, ImageGeometry, NodeCategory, PortInformation,
    PortMetadata, Result, TimeDomain,
};
use serde::{Deserialize, Serialize};

/// Configuration for the time step source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeStepParams {
    pub dimensions: [usize; 3],
    /// Available time values
    pub steps: Vec<f64>,
    /// Oscillations per unit time
    pub frequency: f64,
    pub amplitude: f64,
    pub array_name: String,
}

impl Default for TimeStepParams {
    fn default() -> Self {
        Self {
            dimensions: [4, 4, 1],
            steps: vec![0.0, 1.0, 2.0, 3.0],
            frequency: 0.25,
            amplitude: 1.0,
            array_name: "oscillation".to_string(),
        }
    }
}

impl TimeStepParams {
    fn domain(&self) -> Option<TimeDomain> {
        let domain = TimeDomain::steps(self.steps.iter().copied());
        domain.range().map(|_| domain)
    }

    fn geometry(&self) -> ImageGeometry {
        ImageGeometry {
            dimensions: self.dimensions,
            origin: [0.0; 3],
            spacing: [1.0; 3],
        }
    }
}

/// Time Step Source
///
/// Each point `p` carries `amplitude * sin(TAU * frequency * t + |p|)`.
/// Without a time request the first step is served.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeStepSource;

impl TimeStepSource {
    pub const PORT_OUTPUT: &'static str = "output";
}

impl AlgorithmDescriptor for TimeStepSource {
    fn descriptor() -> AlgorithmMetadata {
        AlgorithmMetadata::new(
            "time-step-source",
            NodeCategory::Source,
            "Time Steps",
            "Oscillating grid field sampled at discrete time steps",
        )
        .output(PortMetadata::optional(Self::PORT_OUTPUT, "Output"))
    }
}

inventory::submit!(pipeline_engine::NodeFactoryFn {
    metadata: TimeStepSource::descriptor,
    create: pipeline_engine::create_node::<TimeStepSource>,
});

impl Algorithm for TimeStepSource {
    type Params = TimeStepParams;

    fn metadata(&self) -> AlgorithmMetadata {
        Self::descriptor()
    }

    fn information(
        &self,
        params: &TimeStepParams,
        _inputs: &[Vec<PortInformation>],
    ) -> Result<Vec<PortInformation>> {
        let mut info = PortInformation::with_kind(DataKind::ImageGrid);
        info.whole_extent = Some(params.geometry().extent());
        info.time = params.domain();
        info.arrays.push(ArrayInfo {
            name: params.array_name.clone(),
            association: Association::Point,
            components: 1,
        });
        Ok(vec![info])
    }

    fn execute(
        &self,
        params: &TimeStepParams,
        ctx: &ExecuteContext<'_>,
    ) -> Result<Vec<DataObject>> {
        let first = params.domain().and_then(|d| d.range()).map(|[start, _]| start);
        let time = ctx.update_time().or(first);
        let phase = TAU * params.frequency * time.unwrap_or(0.0);

        let geometry = params.geometry();
        let values = (0..geometry.point_count())
            .map(|i| {
                let [x, y, z] = geometry.point(i);
                params.amplitude * (phase + (x * x + y * y + z * z).sqrt()).sin()
            })
            .collect();

        let mut data = DataObject::new(Geometry::ImageGrid(geometry));
        data.add_scalars(
            Association::Point,
            AttributeArray::scalars(params.array_name.clone(), values),
        )?;
        data.set_time(time);
        log::debug!("Time step source '{}': sampled t={:?}", ctx.node_id(), time);
        Ok(vec![data])
    }
}
