//! Earth Engine expression graphs.
//!
//! An expression is a table of named value nodes plus the name of the node holding the
//! result. Nodes nest inline, except function bodies which must be referenced by name.
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Expression {
    pub result: String,
    pub values: BTreeMap<String, ValueNode>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ValueNode {
    ConstantValue(Value),
    ArrayValue(ArrayValue),
    FunctionInvocationValue(FunctionInvocation),
    FunctionDefinitionValue(FunctionDefinition),
    ArgumentReference(String),
    ValueReference(String),
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ArrayValue {
    pub values: Vec<ValueNode>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocation {
    pub function_name: String,
    pub arguments: BTreeMap<String, ValueNode>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub argument_names: Vec<String>,
    pub body: String,
}

pub fn constant(value: impl Into<Value>) -> ValueNode {
    ValueNode::ConstantValue(value.into())
}

pub fn array(values: Vec<ValueNode>) -> ValueNode {
    ValueNode::ArrayValue(ArrayValue { values })
}

pub fn argument(name: &str) -> ValueNode {
    ValueNode::ArgumentReference(name.to_string())
}

pub fn invoke<const N: usize>(
    function_name: &str,
    arguments: [(&str, ValueNode); N],
) -> ValueNode {
    ValueNode::FunctionInvocationValue(FunctionInvocation {
        function_name: function_name.to_string(),
        arguments: arguments
            .into_iter()
            .map(|(name, node)| (name.to_string(), node))
            .collect(),
    })
}

#[derive(Default, Debug)]
pub struct ExpressionBuilder {
    values: BTreeMap<String, ValueNode>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `node` under a fresh name and returns the name.
    pub fn define(self: &mut Self, node: ValueNode) -> String {
        let name = self.values.len().to_string();
        self.values.insert(name.clone(), node);
        name
    }

    /// Defines a one-argument function whose body is built from a reference to its argument.
    pub fn function<F>(self: &mut Self, argument_name: &str, body: F) -> ValueNode
    where
        F: FnOnce(ValueNode) -> ValueNode,
    {
        let body = body(argument(argument_name));
        ValueNode::FunctionDefinitionValue(FunctionDefinition {
            argument_names: vec![argument_name.to_string()],
            body: self.define(body),
        })
    }

    pub fn build(mut self: Self, result: ValueNode) -> Expression {
        let result = match result {
            ValueNode::ValueReference(name) => name,
            node => self.define(node),
        };
        Expression {
            result,
            values: self.values,
        }
    }
}
