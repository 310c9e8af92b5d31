// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scalar math nodes.

use crate::evaluation::{CalcContext, EvaluationError};
use crate::node::{NodeBehavior, NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortSpec, PortType, PortValue};

fn float_in(name: &str, default: f32) -> PortSpec {
    PortSpec::input(name, PortType::Float).with_default(PortValue::Float(default))
}

/// Passes its `value` input through; the usual entry point for raw values
#[derive(Debug, Default)]
pub struct Constant;

impl Constant {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "constant".to_string(),
            name: "Constant".to_string(),
            category: NodeCategory::Input,
            description: "Constant float value".to_string(),
            inputs: vec![float_in("value", 0.0)],
            outputs: vec![PortSpec::output("value", PortType::Float)],
        }
    }
}

impl NodeBehavior for Constant {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let value = ctx.float("value")?;
        ctx.set_output("value", PortValue::Float(value))
    }
}

/// `sum = a + b`
#[derive(Debug, Default)]
pub struct Add;

impl Add {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "add".to_string(),
            name: "Add".to_string(),
            category: NodeCategory::Math,
            description: "Add two values".to_string(),
            inputs: vec![float_in("a", 0.0), float_in("b", 0.0)],
            outputs: vec![PortSpec::output("sum", PortType::Float)],
        }
    }
}

impl NodeBehavior for Add {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let sum = ctx.float("a")? + ctx.float("b")?;
        ctx.set_output("sum", PortValue::Float(sum))
    }
}

/// `product = a * b`
#[derive(Debug, Default)]
pub struct Multiply;

impl Multiply {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "multiply".to_string(),
            name: "Multiply".to_string(),
            category: NodeCategory::Math,
            description: "Multiply two values".to_string(),
            inputs: vec![float_in("a", 0.0), float_in("b", 1.0)],
            outputs: vec![PortSpec::output("product", PortType::Float)],
        }
    }
}

impl NodeBehavior for Multiply {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let product = ctx.float("a")? * ctx.float("b")?;
        ctx.set_output("product", PortValue::Float(product))
    }
}

/// `result = -value`
#[derive(Debug, Default)]
pub struct Negate;

impl Negate {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "negate".to_string(),
            name: "Negate".to_string(),
            category: NodeCategory::Math,
            description: "Negate a value".to_string(),
            inputs: vec![float_in("value", 0.0)],
            outputs: vec![PortSpec::output("result", PortType::Float)],
        }
    }
}

impl NodeBehavior for Negate {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let value = ctx.float("value")?;
        ctx.set_output("result", PortValue::Float(-value))
    }
}

/// `quotient = a / b`; a zero divisor faults the node
#[derive(Debug, Default)]
pub struct Divide;

impl Divide {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "divide".to_string(),
            name: "Divide".to_string(),
            category: NodeCategory::Math,
            description: "Divide two values".to_string(),
            inputs: vec![float_in("a", 0.0), float_in("b", 1.0)],
            outputs: vec![PortSpec::output("quotient", PortType::Float)],
        }
    }
}

impl NodeBehavior for Divide {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let divisor = ctx.float("b")?;
        if divisor == 0.0 {
            return Err(EvaluationError::Custom("division by zero".to_string()));
        }
        let quotient = ctx.float("a")? / divisor;
        ctx.set_output("quotient", PortValue::Float(quotient))
    }
}

/// Yields `value`, or `fallback` when `value` holds no data
#[derive(Debug, Default)]
pub struct Fallback;

impl Fallback {
    /// Port schema
    pub fn node_type() -> NodeType {
        NodeType {
            id: "fallback".to_string(),
            name: "Fallback".to_string(),
            category: NodeCategory::Utility,
            description: "Replace missing data with a fallback value".to_string(),
            inputs: vec![
                PortSpec::input("value", PortType::Any),
                PortSpec::input("fallback", PortType::Any),
            ],
            outputs: vec![PortSpec::output("value", PortType::Any)],
        }
    }
}

impl NodeBehavior for Fallback {
    fn calculate(&mut self, ctx: &mut CalcContext<'_>) -> Result<(), EvaluationError> {
        let value = match ctx.input("value")? {
            PortValue::Null => ctx.input("fallback")?.clone(),
            value => value.clone(),
        };
        ctx.set_output("value", value)
    }

    fn accepts_null(&self) -> bool {
        true
    }
}

/// Create the math node registry
pub fn create_math_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register_default::<Constant>(Constant::node_type());
    registry.register_default::<Add>(Add::node_type());
    registry.register_default::<Multiply>(Multiply::node_type());
    registry.register_default::<Negate>(Negate::node_type());
    registry.register_default::<Divide>(Divide::node_type());
    registry.register_default::<Fallback>(Fallback::node_type());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn test_registry_contents() {
        let registry = create_math_registry();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.types_in_category(NodeCategory::Math).count(), 4);
    }

    #[test]
    fn test_chain_from_registry() {
        let registry = create_math_registry();
        let mut graph = Graph::new("math");
        let c = graph.add_from_registry(&registry, "constant").unwrap();
        let neg = graph.add_from_registry(&registry, "negate").unwrap();
        let mul = graph.add_from_registry(&registry, "multiply").unwrap();
        assert!(graph.add_from_registry(&registry, "sqrt").is_none());

        graph.set_raw(graph.input(c, "value").unwrap(), PortValue::Float(3.0)).unwrap();
        graph.connect(graph.output(c, "value").unwrap(), graph.input(neg, "value").unwrap()).unwrap();
        graph.connect(graph.output(neg, "result").unwrap(), graph.input(mul, "a").unwrap()).unwrap();
        graph.set_raw(graph.input(mul, "b").unwrap(), PortValue::Int(4)).unwrap();

        let product = graph.output(mul, "product").unwrap();
        assert_eq!(graph.get(product), Ok(PortValue::Float(-12.0)));
    }

    #[test]
    fn test_fallback_accepts_null() {
        let mut graph = Graph::default();
        let div = graph.add_node(Divide::node_type(), Box::new(Divide));
        let fb = graph.add_node(Fallback::node_type(), Box::new(Fallback));
        graph.set_raw(graph.input(div, "b").unwrap(), PortValue::Float(0.0)).unwrap();
        graph.set_raw(graph.input(fb, "fallback").unwrap(), PortValue::Float(7.0)).unwrap();
        graph.connect(graph.output(div, "quotient").unwrap(), graph.input(fb, "value").unwrap()).unwrap();

        let out = graph.output(fb, "value").unwrap();
        assert_eq!(graph.get(out), Ok(PortValue::Float(7.0)));

        graph.set_raw(graph.input(div, "a").unwrap(), PortValue::Float(9.0)).unwrap();
        graph.set_raw(graph.input(div, "b").unwrap(), PortValue::Float(3.0)).unwrap();
        assert_eq!(graph.get(out), Ok(PortValue::Float(3.0)));
    }
}
