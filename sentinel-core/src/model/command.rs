/// A command template: a name plus an argv-style line containing `$ARGn$`
/// and other macros, expanded at invocation time (spec.md §3.1, §4.10).
#[derive(Clone, Debug)]
pub struct CommandDef {
    pub name: String,
    pub command_line: String,
    /// When set, invocations are routed through this connector instead of a
    /// direct fork/exec (spec.md §4.3).
    pub connector: Option<String>,
}

impl CommandDef {
    pub fn new(name: impl Into<String>, command_line: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command_line: command_line.into(),
            connector: None,
        }
    }
}
