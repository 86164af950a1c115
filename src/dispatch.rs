//! Local functions the assistant may call mid-run.
//!
//! A [`Toolbox`] resolves a tool call by name and runs it. Failures are
//! returned as [`DispatchError`] so the poller can report them to the
//! assistant as the call's output instead of aborting the run.

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{error::Category, Number, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No function is registered under this name.
    UnknownFunction(String),
    /// The arguments are not valid JSON.
    MalformedArguments { function: String, reason: String },
    /// The arguments are valid JSON but do not fit the function's parameters.
    ArgumentMismatch { function: String, reason: String },
    /// The function ran and failed.
    Execution { function: String, reason: String },
}

impl DispatchError {
    fn from_json(function: &str, error: serde_json::Error) -> Self {
        let function = function.to_string();
        let reason = error.to_string();
        match error.classify() {
            Category::Data => DispatchError::ArgumentMismatch { function, reason },
            Category::Syntax | Category::Eof | Category::Io => {
                DispatchError::MalformedArguments { function, reason }
            }
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::UnknownFunction(name) => write!(f, "Function {name} not found."),
            DispatchError::MalformedArguments { function, reason } => {
                write!(f, "Error in calling {function}: arguments are not valid JSON: {reason}")
            }
            DispatchError::ArgumentMismatch { function, reason }
            | DispatchError::Execution { function, reason } => {
                write!(f, "Error in calling {function}: {reason}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/// A function tool as registered on an assistant.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    Function { function: FunctionDefinition },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the parameter object.
    pub parameters: Value,
}

impl FunctionDefinition {
    pub fn new<P: JsonSchema>(name: &str, description: &str) -> Self {
        let mut parameters = serde_json::to_value(schema_for!(P)).unwrap_or_default();
        if let Value::Object(schema) = &mut parameters {
            schema.remove("$schema");
            schema.remove("title");
        }

        FunctionDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters,
        }
    }
}

impl From<FunctionDefinition> for ToolDefinition {
    fn from(function: FunctionDefinition) -> Self {
        ToolDefinition::Function { function }
    }
}

/// The dispatch table consulted by the poller.
#[async_trait]
pub trait Toolbox: Send + Sync {
    /// Every function this toolbox can run.
    fn definitions(&self) -> Vec<FunctionDefinition>;

    /// Runs `name` with JSON-encoded `arguments`.
    async fn call(&self, name: &str, arguments: &str) -> Result<Value, DispatchError>;
}

#[derive(Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Operands {
    /// Left operand.
    #[schemars(with = "f64")]
    pub x: Number,
    /// Right operand.
    #[schemars(with = "f64")]
    pub y: Number,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArithmeticCall {
    Sum(Operands),
    Subtract(Operands),
    Multiply(Operands),
    Divide(Operands),
}

impl ArithmeticCall {
    pub const NAMES: [&'static str; 4] = ["sum", "subtract", "multiply", "divide"];

    /// Resolves a tool call into a typed arithmetic call.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, DispatchError> {
        let call: fn(Operands) -> ArithmeticCall = match name {
            "sum" => ArithmeticCall::Sum,
            "subtract" => ArithmeticCall::Subtract,
            "multiply" => ArithmeticCall::Multiply,
            "divide" => ArithmeticCall::Divide,
            _ => return Err(DispatchError::UnknownFunction(name.to_string())),
        };

        // Calls without parameters may arrive with an empty string.
        let arguments = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        let operands = serde_json::from_str(arguments)
            .map_err(|error| DispatchError::from_json(name, error))?;

        Ok(call(operands))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArithmeticCall::Sum(_) => "sum",
            ArithmeticCall::Subtract(_) => "subtract",
            ArithmeticCall::Multiply(_) => "multiply",
            ArithmeticCall::Divide(_) => "divide",
        }
    }

    fn operands(&self) -> &Operands {
        match self {
            ArithmeticCall::Sum(operands)
            | ArithmeticCall::Subtract(operands)
            | ArithmeticCall::Multiply(operands)
            | ArithmeticCall::Divide(operands) => operands,
        }
    }

    /// Integer operands stay integers except for division, which always
    /// yields a float.
    pub fn evaluate(&self) -> Result<Value, DispatchError> {
        let Operands { x, y } = self.operands();

        if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
            let exact = match self {
                ArithmeticCall::Sum(_) => x.checked_add(y),
                ArithmeticCall::Subtract(_) => x.checked_sub(y),
                ArithmeticCall::Multiply(_) => x.checked_mul(y),
                ArithmeticCall::Divide(_) => None,
            };
            if let Some(result) = exact {
                return Ok(Value::from(result));
            }
        }

        let (x, y) = (as_f64(x), as_f64(y));
        let result = match self {
            ArithmeticCall::Sum(_) => x + y,
            ArithmeticCall::Subtract(_) => x - y,
            ArithmeticCall::Multiply(_) => x * y,
            ArithmeticCall::Divide(_) if y == 0.0 => {
                return Err(self.execution_error("division by zero"));
            }
            ArithmeticCall::Divide(_) => x / y,
        };

        Number::from_f64(result)
            .map(Value::Number)
            .ok_or_else(|| self.execution_error("result is not a finite number"))
    }

    fn execution_error(&self, reason: &str) -> DispatchError {
        DispatchError::Execution {
            function: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

fn as_f64(number: &Number) -> f64 {
    number.as_f64().unwrap_or(f64::NAN)
}

/// The arithmetic dispatch table: `sum`, `subtract`, `multiply` and `divide`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator;

#[async_trait]
impl Toolbox for Calculator {
    fn definitions(&self) -> Vec<FunctionDefinition> {
        vec![
            FunctionDefinition::new::<Operands>("sum", "Adds y to x."),
            FunctionDefinition::new::<Operands>("subtract", "Subtracts y from x."),
            FunctionDefinition::new::<Operands>("multiply", "Multiplies x by y."),
            FunctionDefinition::new::<Operands>("divide", "Divides x by y."),
        ]
    }

    async fn call(&self, name: &str, arguments: &str) -> Result<Value, DispatchError> {
        let call = ArithmeticCall::parse(name, arguments)?;
        debug!(function = name, ?call, "Evaluating arithmetic call");
        call.evaluate()
    }
}
