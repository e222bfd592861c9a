// src/lang/r.rs

use crate::classify::{OutputKind, OutputSpec};
use crate::lang::{Language, LanguageAdapter};
use crate::shim::r_wrapper;

#[derive(Debug, Clone)]
pub struct RAdapter {
    interpreter: String,
}

impl RAdapter {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

/// Looks up the conventional plot variables (`p`, then `fig`) in the
/// script's environment without touching anything that is not bound.
const PICK_PLOT: &str = r#"
  pick <- function(classes) {
    for (name in c("p", "fig")) {
      obj <- get0(name, ifnotfound = NULL)
      if (!is.null(obj) && inherits(obj, classes)) return(obj)
    }
    NULL
  }
"#;

const SAVE_STATIC: &str = r#"
  tryCatch({
    plot_obj <- pick(c("ggplot", "trellis"))
    if (inherits(plot_obj, "ggplot")) {
      ggplot2::ggsave(target, plot = plot_obj, width = 8, height = 6, dpi = 100)
    } else if (!is.null(plot_obj)) {
      grDevices::png(target, width = 800, height = 600)
      print(plot_obj)
      grDevices::dev.off()
    } else if (grDevices::dev.cur() > 1) {
      grDevices::dev.copy(grDevices::png, filename = target, width = 800, height = 600)
      grDevices::dev.off()
    } else {
      message("[vizexec] no figure found: bind a plot to `p` or draw on the active graphics device")
    }
  }, error = function(e) {
    message("[vizexec] saving the figure failed: ", conditionMessage(e))
  })
"#;

const SAVE_INTERACTIVE: &str = r#"
  save_widget <- function(widget) {
    tryCatch(
      htmlwidgets::saveWidget(widget, target, selfcontained = TRUE),
      error = function(e) htmlwidgets::saveWidget(widget, target, selfcontained = FALSE)
    )
  }
  tryCatch({
    widget <- pick("htmlwidget")
    if (!is.null(widget)) {
      save_widget(widget)
    } else if ("rgl" %in% loadedNamespaces() && rgl::cur3d() > 0) {
      save_widget(rgl::rglwidget())
    } else {
      message("[vizexec] no figure found: bind an htmlwidget to `p` or open an rgl scene")
    }
  }, error = function(e) {
    message("[vizexec] saving the figure failed: ", conditionMessage(e))
  })
"#;

impl LanguageAdapter for RAdapter {
    fn language(&self) -> Language {
        Language::R
    }

    fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn source_name(&self) -> &'static str {
        "source.R"
    }

    fn script_name(&self) -> &'static str {
        "script.R"
    }

    fn wrapper_name(&self) -> &'static str {
        "vizexec_r_wrapper.R"
    }

    fn wrapper_source(&self) -> &'static str {
        r_wrapper()
    }

    fn save_code(&self, spec: &OutputSpec) -> String {
        let body = match spec.kind {
            OutputKind::StaticImage => SAVE_STATIC,
            OutputKind::InteractiveDocument => SAVE_INTERACTIVE,
        };
        format!(
            "\n# --- vizexec: save {} ---\nlocal({{\n  target <- normalizePath(file.path(output_dir, output_file), mustWork = FALSE)\n{}{}}})\n",
            spec.filename, PICK_PLOT, body
        )
    }
}
