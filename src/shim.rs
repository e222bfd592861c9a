// src/shim.rs

//! Wrapper entry points for executing plotting scripts.
//!
//! The Rust service does NOT evaluate Python or R itself.
//! It spawns the interpreter on a tiny, fixed wrapper program.
//!
//! Contract shared by every wrapper:
//! - Usage: `<interpreter> <wrapper> <script_path> <output_dir> <output_file>`
//! - Bind `output_dir` / `output_file` in the scope the script runs in
//! - Run the script (user code + synthesized save fragment)
//! - Print a success line to STDOUT when `<output_dir>/<output_file>` exists,
//!   a warning otherwise; exit 0 / 1 accordingly, 2 on bad usage
//!
//! The exit code is informational only. The executor decides success by
//! looking for the artifact file after the process is gone.

/// Python wrapper.
///
/// Usage (internal):
/// python3 vizexec_python_wrapper.py <script.py> <output_dir> <output_file>
pub fn python_wrapper() -> &'static str {
    r#"# vizexec_python_wrapper.py
#
# Runs a plotting script with a headless matplotlib backend and reports
# whether the expected artifact was written.

import os
import sys
import traceback


def main():
    if len(sys.argv) != 4:
        print(
            "Usage: vizexec_python_wrapper.py <script_path> <output_dir> <output_file>",
            file=sys.stderr,
        )
        sys.exit(2)

    script_path, output_dir, output_file = sys.argv[1:4]

    try:
        import matplotlib

        matplotlib.use("Agg")
    except ImportError:
        print("Warning: matplotlib not available", file=sys.stderr)

    namespace = {
        "__name__": "__main__",
        "__file__": script_path,
        "output_dir": output_dir,
        "output_file": output_file,
    }

    with open(script_path, "r", encoding="utf-8") as f:
        source = f.read()

    try:
        exec(compile(source, script_path, "exec"), namespace)
    except SystemExit:
        pass
    except BaseException as e:
        print(f"Error executing script: {e}", file=sys.stderr)
        traceback.print_exc()

    output_path = os.path.join(output_dir, output_file)
    if os.path.exists(output_path):
        print(f"Visualization successfully saved to {output_path}")
        sys.exit(0)

    print(f"Warning: Output file {output_path} was not created")
    sys.exit(1)


if __name__ == "__main__":
    main()
"#
}

/// R wrapper.
///
/// Usage (internal):
/// Rscript vizexec_r_wrapper.R <script.R> <output_dir> <output_file>
pub fn r_wrapper() -> &'static str {
    r#"# vizexec_r_wrapper.R
#
# Sources a plotting script in a private environment and reports whether
# the expected artifact was written.

args <- commandArgs(trailingOnly = TRUE)
if (length(args) != 3) {
  message("Usage: vizexec_r_wrapper.R <script_path> <output_dir> <output_file>")
  quit(save = "no", status = 2)
}

script_path <- args[[1]]
output_dir <- args[[2]]
output_file <- args[[3]]

env <- new.env(parent = globalenv())
assign("output_dir", output_dir, envir = env)
assign("output_file", output_file, envir = env)

tryCatch(
  source(script_path, local = env, echo = FALSE),
  error = function(e) {
    message("Error executing script: ", conditionMessage(e))
    calls <- sys.calls()
    if (length(calls) > 0) {
      message(paste(vapply(calls, function(cl) paste(deparse(cl), collapse = " "), ""), collapse = "\n"))
    }
  }
)

output_path <- file.path(output_dir, output_file)
if (file.exists(output_path)) {
  cat("Visualization successfully saved to", output_path, "\n")
  quit(save = "no", status = 0)
}

cat("Warning: Output file", output_path, "was not created\n")
quit(save = "no", status = 1)
"#
}
