//! Phenotype export handed to the body builder
//!
//! A `Phenotype` is the read-only result of a successful development: one
//! entry per cell with its final properties, neural inputs and the genotype
//! range that produced it.

use std::f64::consts::FRAC_PI_4;

use ahash::HashMap;
use embryo_alphabet::{GeneProps, NeuronProps};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::develop::{LinkTarget, Organism};
use crate::tree::CellKind;

/// Neural input of an exported neuron
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhenotypeLink {
    pub source: LinkTarget,
    pub weight: f64,
}

/// One exported cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhenotypeCell {
    pub index: usize,
    pub kind: CellKind,
    /// Neuron class; `None` for sticks
    pub class: Option<String>,
    pub parent: Option<usize>,
    /// Branch angle in radians relative to the parent
    pub branch_angle: f64,
    pub props: GeneProps,
    /// Neuron dynamics; `None` for sticks
    pub neuron: Option<NeuronProps>,
    pub inputs: Vec<PhenotypeLink>,
    /// Smallest and largest genotype offsets that shaped this cell
    pub provenance: (usize, usize),
}

/// Node of the neural graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NeuralNode {
    Neuron { cell: usize, class: String },
    Sensor(String),
}

/// Exported result of developing a genotype
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phenotype {
    pub cells: Vec<PhenotypeCell>,
}

impl Phenotype {
    pub fn from_organism(organism: &Organism) -> Self {
        let cells = organism
            .cells()
            .iter()
            .map(|cell| {
                // Development only completes once every cell has differentiated
                let kind = cell.kind.unwrap_or(CellKind::Stick);
                let is_neuron = kind == CellKind::Neuron;
                PhenotypeCell {
                    index: cell.index,
                    kind,
                    class: cell.class_name().map(str::to_string),
                    parent: cell.parent,
                    branch_angle: cell.props.rotation + f64::from(cell.angle_slot) * FRAC_PI_4,
                    props: cell.props.clone(),
                    neuron: is_neuron.then(|| cell.neuron.clone()),
                    inputs: cell
                        .inputs
                        .iter()
                        .map(|link| PhenotypeLink {
                            source: link.source.clone(),
                            weight: link.weight,
                        })
                        .collect(),
                    provenance: cell.provenance,
                }
            })
            .collect();
        Self { cells }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn stick_count(&self) -> usize {
        self.cells.iter().filter(|c| c.kind == CellKind::Stick).count()
    }

    pub fn neuron_count(&self) -> usize {
        self.cells.iter().filter(|c| c.kind == CellKind::Neuron).count()
    }

    pub fn link_count(&self) -> usize {
        self.cells.iter().map(|c| c.inputs.len()).sum()
    }

    /// Cells whose provenance range covers a genotype offset
    pub fn cells_at_offset(&self, offset: usize) -> Vec<usize> {
        self.cells
            .iter()
            .filter(|c| (c.provenance.0..=c.provenance.1).contains(&offset))
            .map(|c| c.index)
            .collect()
    }

    /// Directed graph of neurons and sensors; edges carry link weights
    pub fn neural_graph(&self) -> DiGraph<NeuralNode, f64> {
        let mut graph = DiGraph::new();
        let mut neurons: HashMap<usize, NodeIndex> = HashMap::default();
        let mut sensors: HashMap<String, NodeIndex> = HashMap::default();

        for cell in &self.cells {
            if let Some(class) = &cell.class {
                let idx = graph.add_node(NeuralNode::Neuron {
                    cell: cell.index,
                    class: class.clone(),
                });
                neurons.insert(cell.index, idx);
            }
        }

        for cell in &self.cells {
            let Some(&target) = neurons.get(&cell.index) else {
                continue;
            };
            for link in &cell.inputs {
                let source = match &link.source {
                    LinkTarget::Cell(index) => match neurons.get(index) {
                        Some(&idx) => idx,
                        None => continue,
                    },
                    LinkTarget::Sensor(name) => *sensors
                        .entry(name.clone())
                        .or_insert_with(|| graph.add_node(NeuralNode::Sensor(name.clone()))),
                };
                graph.add_edge(source, target, link.weight);
            }
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::develop::grow;
    use crate::parser::parse;
    use embryo_alphabet::Alphabet;

    fn phenotype(text: &str) -> Phenotype {
        let alphabet = Alphabet::default();
        let tree = parse(&alphabet, text).unwrap();
        Phenotype::from_organism(&grow(&tree, &alphabet).unwrap())
    }

    #[test]
    fn test_counts() {
        let p = phenotype("<X><N[G]>N[-1:0.5][T]>");
        assert_eq!(p.cell_count(), 3);
        assert_eq!(p.stick_count(), 1);
        assert_eq!(p.neuron_count(), 2);
        assert_eq!(p.link_count(), 3);
    }

    #[test]
    fn test_sticks_have_no_neuron_data() {
        let p = phenotype("X>");
        assert_eq!(p.cells[0].class, None);
        assert_eq!(p.cells[0].neuron, None);

        let p = phenotype("N>");
        assert_eq!(p.cells[0].class.as_deref(), Some("N"));
        assert!(p.cells[0].neuron.is_some());
    }

    #[test]
    fn test_branch_angles() {
        let p = phenotype("<<X>X>X>");
        assert_eq!(p.cells[0].branch_angle, 0.0);
        assert!((p.cells[1].branch_angle - FRAC_PI_4).abs() < 1e-12);
        assert!((p.cells[2].branch_angle - 2.0 * FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_cells_at_offset() {
        // offset 1 is the first branch, interpreted by cell 0 only
        let p = phenotype("<X>LN>");
        assert_eq!(p.cells_at_offset(1), vec![0]);
        assert_eq!(p.cells_at_offset(4), vec![1]);
        assert!(p.cells_at_offset(0).contains(&0));
    }

    #[test]
    fn test_neural_graph() {
        let p = phenotype("<N[G:2]>N[-1:0.5][G]>");
        let graph = p.neural_graph();
        // two neurons plus one shared gyroscope
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        let total: f64 = graph.edge_weights().sum();
        assert!((total - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_serializes_to_json() {
        let p = phenotype("N[G]>");
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"Sensor\":\"G\""));
        assert!(json.contains("\"kind\":\"Neuron\""));
    }
}
