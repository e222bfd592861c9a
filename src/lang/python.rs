// src/lang/python.rs

use crate::classify::{OutputKind, OutputSpec};
use crate::lang::{Language, LanguageAdapter};
use crate::shim::python_wrapper;

#[derive(Debug, Clone)]
pub struct PythonAdapter {
    interpreter: String,
}

impl PythonAdapter {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

/// Static images: a `fig` with `savefig` (or a seaborn grid / axes holding one),
/// else whatever pyplot currently has open.
const SAVE_STATIC: &str = r#"
def __vizexec_save():
    import os
    import sys

    target = os.path.join(output_dir, output_file)
    fig = globals().get("fig")
    try:
        if fig is not None and hasattr(fig, "savefig"):
            fig.savefig(target, bbox_inches="tight")
            return
        if fig is not None and hasattr(getattr(fig, "figure", None), "savefig"):
            fig.figure.savefig(target, bbox_inches="tight")
            return
        plt = sys.modules.get("matplotlib.pyplot")
        if plt is not None and plt.get_fignums():
            plt.savefig(target, bbox_inches="tight")
            plt.close("all")
            return
        print(
            "[vizexec] no figure found: bind a figure to `fig` or draw with matplotlib.pyplot",
            file=sys.stderr,
        )
    except Exception as exc:
        print(f"[vizexec] saving the figure failed: {exc}", file=sys.stderr)


__vizexec_save()
"#;

/// Interactive documents: `fig` written by plotly or bokeh, whichever is loaded.
const SAVE_INTERACTIVE: &str = r#"
def __vizexec_save():
    import os
    import sys

    target = os.path.join(output_dir, output_file)
    fig = globals().get("fig")
    if fig is None:
        print("[vizexec] no figure found: bind an interactive figure to `fig`", file=sys.stderr)
        return
    try:
        if "plotly" in sys.modules:
            import plotly.io as pio

            pio.write_html(fig, target)
        elif "bokeh" in sys.modules:
            from bokeh.io import save

            save(fig, filename=target)
        elif hasattr(fig, "write_html"):
            fig.write_html(target)
        else:
            print("[vizexec] no interactive plotting library is loaded", file=sys.stderr)
    except Exception as exc:
        print(f"[vizexec] saving the figure failed: {exc}", file=sys.stderr)


__vizexec_save()
"#;

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn source_name(&self) -> &'static str {
        "source.py"
    }

    fn script_name(&self) -> &'static str {
        "script.py"
    }

    fn wrapper_name(&self) -> &'static str {
        "vizexec_python_wrapper.py"
    }

    fn wrapper_source(&self) -> &'static str {
        python_wrapper()
    }

    fn save_code(&self, spec: &OutputSpec) -> String {
        let body = match spec.kind {
            OutputKind::StaticImage => SAVE_STATIC,
            OutputKind::InteractiveDocument => SAVE_INTERACTIVE,
        };
        format!("\n# --- vizexec: save {} ---{}", spec.filename, body)
    }

    fn env(&self) -> Vec<(&'static str, &'static str)> {
        vec![("MPLBACKEND", "Agg"), ("PYTHONUNBUFFERED", "1")]
    }
}
