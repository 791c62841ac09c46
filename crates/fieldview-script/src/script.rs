//! Command text builder.
//!
//! Commands sent to the interpreter are assembled from [`Call`]s. Function
//! names and option keys are `&'static str` picked by code; every runtime
//! string goes through [`quote`] and ends up as a JSON string literal, which
//! is also a valid JavaScript string literal. Dataset paths and field names
//! coming from clients can therefore never terminate a literal early.

use std::fmt::Write as _;

use crate::object::ObjectRef;

/// Render a string as a quoted, escaped script literal.
pub fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_owned()).to_string()
}

/// A value passed to an engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    List(Vec<Arg>),
    /// `{Key: value, ...}` with keys chosen by code.
    Options(Vec<(&'static str, Arg)>),
    /// A name bound earlier in the same command or in a previous one.
    Name(String),
    /// A fetched handle; checked against the engine id when resolved.
    Handle(ObjectRef),
    Call(Call),
}

impl Arg {
    pub fn name(name: impl Into<String>) -> Self {
        Arg::Name(name.into())
    }

    pub fn list<I, A>(items: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Arg::List(items.into_iter().map(Into::into).collect())
    }

    fn render(&self, out: &mut String) {
        match self {
            Arg::Null => out.push_str("null"),
            Arg::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Arg::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            Arg::Num(n) => render_number(*n, out),
            Arg::Str(s) => out.push_str(&quote(s)),
            Arg::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render(out);
                }
                out.push(']');
            }
            Arg::Options(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    value.render(out);
                }
                out.push('}');
            }
            Arg::Name(name) => {
                let _ = write!(out, "__fv.get({})", quote(name));
            }
            Arg::Handle(handle) => {
                let _ = write!(out, "__fv.ref({}, {})", quote(&handle.name), handle.id);
            }
            Arg::Call(call) => call.render(out),
        }
    }
}

fn render_number(n: f64, out: &mut String) {
    if n.is_nan() {
        out.push_str("NaN");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        let _ = write!(out, "{}", n);
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_owned())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<u32> for Arg {
    fn from(i: u32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Num(n)
    }
}

impl From<&ObjectRef> for Arg {
    fn from(handle: &ObjectRef) -> Self {
        Arg::Handle(handle.clone())
    }
}

impl From<Call> for Arg {
    fn from(call: Call) -> Self {
        Arg::Call(call)
    }
}

/// A call into the engine's scripting surface, e.g. `pvs.Show(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    namespace: Option<&'static str>,
    function: &'static str,
    args: Vec<Arg>,
}

impl Call {
    /// A call on the engine namespace (`pvs.<function>`).
    pub fn engine(function: &'static str) -> Self {
        Self {
            namespace: Some("pvs"),
            function,
            args: Vec::new(),
        }
    }

    /// A call on a global function path such as `"__log.info"`.
    pub fn global(function: &'static str) -> Self {
        Self {
            namespace: None,
            function,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn render(&self, out: &mut String) {
        if let Some(namespace) = self.namespace {
            out.push_str(namespace);
            out.push('.');
        }
        out.push_str(self.function);
        out.push('(');
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            arg.render(out);
        }
        out.push(')');
    }
}

/// An ordered list of statements executed as a single command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    statements: Vec<String>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name = call(...)`, staged until the whole command succeeds.
    pub fn bind(&mut self, name: &str, call: Call) -> &mut Self {
        let mut line = format!("__fv.bind({}, ", quote(name));
        call.render(&mut line);
        line.push_str(");");
        self.statements.push(line);
        self
    }

    pub fn call(&mut self, call: Call) -> &mut Self {
        let mut line = String::new();
        call.render(&mut line);
        line.push(';');
        self.statements.push(line);
        self
    }

    /// Delete the engine object behind `handle` and drop its binding.
    pub fn release(&mut self, handle: &ObjectRef) -> &mut Self {
        self.call(Call::engine("Delete").arg(handle));
        self.unbind(&handle.name)
    }

    pub fn unbind(&mut self, name: &str) -> &mut Self {
        self.statements.push(format!("__fv.unbind({});", quote(name)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// The command body, one statement per line.
    pub fn render(&self) -> String {
        self.statements.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_quotes_and_newlines() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("line\nbreak"), "\"line\\nbreak\"");
        assert_eq!(quote("it's"), "\"it's\"");
    }

    #[test]
    fn test_bind_and_call_render() {
        let mut script = Script::new();
        script
            .bind(
                "p1_src",
                Call::engine("MEDReader").arg(Arg::Options(vec![("FileName", "mesh.med".into())])),
            )
            .call(
                Call::engine("ColorBy")
                    .arg(Arg::name("p1_disp"))
                    .arg(Arg::list(["POINTS", "temperature"])),
            );

        let text = script.render();
        assert_eq!(
            text,
            "__fv.bind(\"p1_src\", pvs.MEDReader({FileName: \"mesh.med\"}));\n\
             pvs.ColorBy(__fv.get(\"p1_disp\"), [\"POINTS\", \"temperature\"]);"
        );
    }

    #[test]
    fn test_hostile_locator_stays_a_literal() {
        let hostile = "x\"); pvs.Delete(__fv.get(\"p2_src\")); (\"";
        let mut script = Script::new();
        script.bind(
            "p1_src",
            Call::engine("MEDReader").arg(Arg::Options(vec![("FileName", hostile.into())])),
        );

        let text = script.render();
        // The only unescaped quotes left are the literal delimiters.
        assert!(text.contains("\\\"); pvs.Delete(__fv.get(\\\"p2_src\\\")); (\\\""));
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn test_handles_render_with_id_check() {
        let handle = ObjectRef::new("p4_disp", 17, "Representation");
        let mut script = Script::new();
        script.release(&handle);
        assert_eq!(
            script.statements(),
            &[
                "pvs.Delete(__fv.ref(\"p4_disp\", 17));".to_string(),
                "__fv.unbind(\"p4_disp\");".to_string(),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut out = String::new();
        Arg::Num(0.5).render(&mut out);
        out.push(' ');
        Arg::Num(f64::NAN).render(&mut out);
        out.push(' ');
        Arg::Num(f64::NEG_INFINITY).render(&mut out);
        out.push(' ');
        Arg::Int(-3).render(&mut out);
        assert_eq!(out, "0.5 NaN -Infinity -3");
    }

    #[test]
    fn test_global_call() {
        let mut script = Script::new();
        script.call(Call::global("__log.info").arg("ready"));
        assert_eq!(script.render(), "__log.info(\"ready\");");
    }

    #[test]
    fn test_nested_call_argument() {
        let mut script = Script::new();
        script.call(
            Call::engine("ResetCamera").arg(
                Call::engine("FindOrCreateView")
                    .arg("RenderView")
                    .arg("Overlap"),
            ),
        );
        assert_eq!(
            script.render(),
            "pvs.ResetCamera(pvs.FindOrCreateView(\"RenderView\", \"Overlap\"));"
        );
    }
}
