use crate::session::proto::Oid;

/// One entry of the target call stack, as reported by the engine.
/// Level 0 is the innermost frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub level: u32,
    /// Human-readable name of the function owning the frame.
    pub target_name: String,
    /// Engine identifier of that function.
    pub func: Oid,
    /// Argument list as the engine prints it.
    pub args: String,
    /// Line the frame is currently stopped at, 1-based.
    pub line_number: u32,
}

/// A variable visible in the selected frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: String,
    /// Declared type, engine-formatted.
    pub dtype: String,
    pub var_class: String,
    /// Line of the declaration, 1-based.
    pub line_number: u32,
    pub unique: bool,
    pub constant: bool,
    pub not_null: bool,
}

/// One registered breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub func: Oid,
    /// `None` marks a function-entry breakpoint.
    pub line_number: Option<u32>,
    pub target_name: String,
}

/// Source text of the function owning the selected frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceListing {
    lines: Vec<String>,
}

impl SourceListing {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Fetch a line by its 1-based source number.
    pub fn line(&self, number: u32) -> Option<&str> {
        if number == 0 {
            return None;
        }
        self.lines.get(number as usize - 1).map(String::as_str)
    }
}
