//! Printable summaries of pipeline outputs

use pipeline_engine::{Association, DataObject, ExecutiveStats};
use serde::Serialize;

/// One attribute array of an output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySummary {
    pub name: String,
    pub association: Association,
    pub components: usize,
    pub active: bool,
    /// Range of the first component, absent for empty arrays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

/// Shape of one output data object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSummary {
    pub node_id: String,
    pub output: usize,
    pub kind: String,
    pub points: usize,
    pub cells: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[[f64; 3]; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    pub arrays: Vec<ArraySummary>,
    pub executions: u64,
    pub cache_hits: u64,
}

impl OutputSummary {
    pub fn new(node_id: &str, output: usize, data: &DataObject, stats: &ExecutiveStats) -> Self {
        let arrays = Association::ALL
            .iter()
            .flat_map(|&association| {
                let active = data.active_scalars_name(association);
                data.arrays(association).iter().map(move |array| {
                    let name = array.name().unwrap_or("<unnamed>").to_string();
                    ArraySummary {
                        active: array.name().is_some() && array.name() == active,
                        name,
                        association,
                        components: array.components(),
                        range: array.component_range(0),
                    }
                })
            })
            .collect();
        Self {
            node_id: node_id.to_string(),
            output,
            kind: data.kind().to_string(),
            points: data.point_count(),
            cells: data.cell_count(),
            bounds: data.bounds().map(|b| [b.min, b.max]),
            time: data.time(),
            arrays,
            executions: stats.executions,
            cache_hits: stats.cache_hits,
        }
    }

    /// Multi-line human-readable rendering
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "{}[{}]: {} with {} points, {} cells",
            self.node_id, self.output, self.kind, self.points, self.cells
        )];
        if let Some([min, max]) = self.bounds {
            lines.push(format!("  bounds: {:?} .. {:?}", min, max));
        }
        if let Some(time) = self.time {
            lines.push(format!("  time: {}", time));
        }
        for array in &self.arrays {
            let range = match array.range {
                Some([lo, hi]) => format!("[{}, {}]", lo, hi),
                None => "empty".to_string(),
            };
            lines.push(format!(
                "  {} array '{}' ({} components){}: {}",
                array.association,
                array.name,
                array.components,
                if array.active { ", active" } else { "" },
                range
            ));
        }
        lines.push(format!(
            "  executions: {}, cache hits: {}",
            self.executions, self.cache_hits
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_engine::{AttributeArray, Geometry};

    fn sample() -> DataObject {
        let mut data = DataObject::new(Geometry::PointSet {
            points: vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]],
        });
        data.add_scalars(Association::Point, AttributeArray::scalars("s", vec![4.0, -1.0]))
            .unwrap();
        data.add_array(Association::Point, AttributeArray::scalars("t", vec![0.0, 0.0]))
            .unwrap();
        data.set_time(Some(2.0));
        data
    }

    #[test]
    fn test_summary_fields() {
        let summary = OutputSummary::new("n", 0, &sample(), &ExecutiveStats::default());
        assert_eq!(summary.points, 2);
        assert_eq!(summary.bounds, Some([[0.0; 3], [1.0, 2.0, 3.0]]));
        assert_eq!(summary.time, Some(2.0));
        assert_eq!(summary.arrays.len(), 2);
        assert!(summary.arrays[0].active);
        assert!(!summary.arrays[1].active);
        assert_eq!(summary.arrays[0].range, Some([-1.0, 4.0]));
    }

    #[test]
    fn test_render_mentions_arrays() {
        let rendered = OutputSummary::new("n", 1, &sample(), &ExecutiveStats::default()).render();
        assert!(rendered.starts_with("n[1]: point set with 2 points"));
        assert!(rendered.contains("array 's' (1 components), active: [-1, 4]"));
        assert!(rendered.contains("time: 2"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let summary = OutputSummary::new("n", 0, &sample(), &ExecutiveStats::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["nodeId"], "n");
        assert_eq!(json["cacheHits"], 0);
        assert_eq!(json["arrays"][0]["association"], "point");
    }
}
