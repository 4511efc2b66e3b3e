use crate::error::ShapeError;

/// Kind of one declared handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// The per-request [`RequestContext`](crate::RequestContext).
    Context,
    /// A record type the decoder can build.
    Record(&'static str),
    /// Anything else, by type name.
    Other(&'static str),
}

impl ParamKind {
    fn type_name(&self) -> &'static str {
        match self {
            ParamKind::Context => "&RequestContext",
            ParamKind::Record(name) | ParamKind::Other(name) => *name,
        }
    }
}

/// Kind of one declared handler output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Error-like success/failure flag.
    Outcome,
    /// A result value, by type name.
    Value(&'static str),
}

impl OutputKind {
    fn type_name(&self) -> &'static str {
        match self {
            OutputKind::Outcome => "outcome",
            OutputKind::Value(name) => *name,
        }
    }
}

/// The supported handler shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// `(context) -> outcome`
    NoInput,
    /// `(context) -> (value, outcome)`
    NoInputWithValue,
    /// `(context, record) -> outcome`
    RecordInput,
    /// `(context, record) -> (value, outcome)`
    RecordInputWithValue,
}

impl ShapeKind {
    pub fn takes_record(&self) -> bool {
        matches!(self, ShapeKind::RecordInput | ShapeKind::RecordInputWithValue)
    }

    pub fn returns_value(&self) -> bool {
        matches!(
            self,
            ShapeKind::NoInputWithValue | ShapeKind::RecordInputWithValue
        )
    }
}

/// Declared inputs and outputs of a handler candidate.
///
/// Typed handlers report theirs through
/// [`IntoHandler::signature`](crate::IntoHandler::signature); handlers
/// described at runtime build one with the methods below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    candidate: &'static str,
    callable: bool,
    inputs: Vec<ParamKind>,
    outputs: Vec<OutputKind>,
}

impl Signature {
    pub fn function(candidate: &'static str) -> Self {
        Signature {
            candidate,
            callable: true,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// A candidate that cannot be called at all.
    pub fn not_callable(candidate: &'static str) -> Self {
        Signature {
            callable: false,
            ..Signature::function(candidate)
        }
    }

    pub fn input(mut self, kind: ParamKind) -> Self {
        self.inputs.push(kind);
        self
    }

    pub fn output(mut self, kind: OutputKind) -> Self {
        self.outputs.push(kind);
        self
    }

    pub fn candidate(&self) -> &'static str {
        self.candidate
    }

    pub fn inputs(&self) -> &[ParamKind] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputKind] {
        &self.outputs
    }

    /// Check the registration rules in order and name the first one violated.
    ///
    /// # Errors
    ///
    /// Returns the [`ShapeError`] for the first rule the signature breaks.
    pub fn classify(&self) -> Result<ShapeKind, ShapeError> {
        if !self.callable {
            return Err(ShapeError::NotCallable {
                candidate: self.candidate,
            });
        }

        let takes_record = match self.inputs.as_slice() {
            [] => return Err(ShapeError::NoParameters),
            [ParamKind::Context] => false,
            [ParamKind::Context, ParamKind::Record(_)] => true,
            [ParamKind::Context, second] => {
                return Err(ShapeError::SecondParameterNotRecord {
                    found: second.type_name(),
                })
            }
            [first] | [first, _] => {
                return Err(ShapeError::FirstParameterNotContext {
                    found: first.type_name(),
                })
            }
            more => {
                return Err(ShapeError::TooManyParameters { count: more.len() })
            }
        };

        let returns_value = match self.outputs.as_slice() {
            [] => return Err(ShapeError::NoOutputs),
            [OutputKind::Outcome] => false,
            [OutputKind::Value(found)] => {
                return Err(ShapeError::SingleOutputNotOutcome { found: *found })
            }
            [_, OutputKind::Outcome] => true,
            [_, second] => {
                return Err(ShapeError::SecondOutputNotOutcome {
                    found: second.type_name(),
                })
            }
            more => return Err(ShapeError::TooManyOutputs { count: more.len() }),
        };

        Ok(match (takes_record, returns_value) {
            (false, false) => ShapeKind::NoInput,
            (false, true) => ShapeKind::NoInputWithValue,
            (true, false) => ShapeKind::RecordInput,
            (true, true) => ShapeKind::RecordInputWithValue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> Signature {
        Signature::function("handler").input(ParamKind::Context)
    }

    #[test]
    fn accepts_the_four_shapes() {
        let record = ParamKind::Record("CreateUser");
        let value = OutputKind::Value("User");
        let cases = [
            (handler().output(OutputKind::Outcome), ShapeKind::NoInput),
            (
                handler().output(value).output(OutputKind::Outcome),
                ShapeKind::NoInputWithValue,
            ),
            (
                handler().input(record).output(OutputKind::Outcome),
                ShapeKind::RecordInput,
            ),
            (
                handler()
                    .input(record)
                    .output(value)
                    .output(OutputKind::Outcome),
                ShapeKind::RecordInputWithValue,
            ),
        ];
        for (signature, expected) in cases {
            assert_eq!(signature.classify().unwrap(), expected);
        }
    }

    #[test]
    fn parameter_count_is_checked_before_parameter_kinds() {
        let err = Signature::function("three")
            .input(ParamKind::Other("u8"))
            .input(ParamKind::Other("u8"))
            .input(ParamKind::Other("u8"))
            .output(OutputKind::Outcome)
            .classify()
            .unwrap_err();
        assert_eq!(err, ShapeError::TooManyParameters { count: 3 });
    }

    #[test]
    fn names_the_offending_type() {
        let err = Signature::function("f")
            .input(ParamKind::Other("String"))
            .output(OutputKind::Outcome)
            .classify()
            .unwrap_err();
        assert_eq!(err, ShapeError::FirstParameterNotContext { found: "String" });

        let err = handler()
            .input(ParamKind::Other("u32"))
            .output(OutputKind::Outcome)
            .classify()
            .unwrap_err();
        assert_eq!(err, ShapeError::SecondParameterNotRecord { found: "u32" });

        let err = handler()
            .output(OutputKind::Value("User"))
            .classify()
            .unwrap_err();
        assert_eq!(err, ShapeError::SingleOutputNotOutcome { found: "User" });
    }

    #[test]
    fn outputs_are_checked_after_inputs() {
        assert_eq!(
            Signature::function("f").classify().unwrap_err(),
            ShapeError::NoParameters
        );
        assert_eq!(handler().classify().unwrap_err(), ShapeError::NoOutputs);
        assert_eq!(
            Signature::not_callable("42").classify().unwrap_err(),
            ShapeError::NotCallable { candidate: "42" }
        );
    }
}
