// src/runner.rs

use crate::cli::{Cli, Command, DEFAULT_CONFIG};
use crate::config::Config;
use crate::engine::{response::VisualizeResponse, Pipeline, VisualizeRequest};
use crate::lang::Language;
use crate::prune::prune;
use crate::runtime;
use crate::util::{ensure_dir, read_to_string, write_file};

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => init_scaffold(Path::new(".")),

        Command::Serve { config, addr } => {
            let mut cfg = load_config(&config)?;
            if let Some(addr) = addr {
                cfg.server.addr = addr;
            }
            runtime::serve(cfg).await
        }

        Command::Run {
            file,
            language,
            config,
        } => {
            let cfg = load_config(&config)?;
            run_file(&cfg, &file, language.as_deref()).await
        }

        Command::Prune {
            config,
            older_than_hours,
        } => {
            let cfg = load_config(&config)?;
            let hours = older_than_hours
                .or(cfg.retention.max_age_hours)
                .context(
                    "No retention age: pass --older-than-hours or set retention.max_age_hours",
                )?;

            let report = prune(&cfg.storage.dir, Duration::from_secs(hours * 3600))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path, path == Path::new(DEFAULT_CONFIG))
}

/* ---------------- one-shot run ---------------- */

async fn run_file(cfg: &Config, file: &Path, language: Option<&str>) -> Result<()> {
    let language = match language {
        Some(l) => l.to_string(),
        None => {
            let ext = file.extension().and_then(|s| s.to_str()).unwrap_or("");
            match Language::from_extension(ext) {
                Some(l) => l.as_str().to_string(),
                None => bail!(
                    "Cannot infer language from {:?}; pass --language python|r",
                    file
                ),
            }
        }
    };

    let code = read_to_string(file)?;
    let pipeline = Pipeline::from_config(cfg);
    let result = pipeline.run(VisualizeRequest::new(code, language)).await;

    let (_, body) = VisualizeResponse::from_result(&result);
    println!("{}", serde_json::to_string_pretty(&body)?);

    match result {
        Ok(viz) => {
            eprintln!("Saved {}", viz.artifact_path.display());
            Ok(())
        }
        Err(_) => bail!("Run failed"),
    }
}

/* -------------------------------------------------
   init_scaffold + defaults
-------------------------------------------------- */

fn init_scaffold(base: &Path) -> Result<()> {
    let config_path = base.join(DEFAULT_CONFIG);
    create_if_missing(&config_path, default_config_yaml())?;

    let samples = base.join("samples");
    ensure_dir(&samples)?;
    for (name, body) in sample_scripts() {
        create_if_missing(&samples.join(name), body)?;
    }

    Ok(())
}

fn create_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        eprintln!("{} already exists (skipping)", path.display());
        return Ok(());
    }
    write_file(path, contents.trim_start())?;
    eprintln!("Created {}", path.display());
    Ok(())
}

fn default_config_yaml() -> &'static str {
    r#"
storage:
  dir: visualizations

runtime:
  python: python3
  r: Rscript

execution:
  timeout_secs: 60
  max_output_bytes: 65536
  max_code_bytes: 262144

env:
  MPLCONFIGDIR: /tmp/vizexec-mpl

server:
  addr: 127.0.0.1:5000
  cors: true

retention:
  # max_age_hours: 72
  sweep_interval_secs: 3600
"#
}

fn sample_scripts() -> [(&'static str, &'static str); 4] {
    [
        (
            "bar_chart.py",
            r#"
import matplotlib.pyplot as plt
import numpy as np

categories = ['A', 'B', 'C', 'D', 'E']
values = np.random.rand(5) * 10

plt.figure(figsize=(8, 6))
plt.bar(categories, values, color='skyblue')
plt.title('Simple Bar Chart')
plt.xlabel('Categories')
plt.ylabel('Values')
plt.grid(axis='y', linestyle='--', alpha=0.7)
"#,
        ),
        (
            "sine_wave.py",
            r#"
import plotly.graph_objects as go
import numpy as np

x = np.linspace(0, 10, 100)
y = np.sin(x)

fig = go.Figure()
fig.add_trace(go.Scatter(x=x, y=y, mode='lines', name='sin(x)'))
fig.update_layout(
    title='Interactive Sine Wave',
    xaxis_title='X',
    yaxis_title='sin(X)',
    template='plotly_white'
)
"#,
        ),
        (
            "bar_chart.R",
            r#"
library(ggplot2)

data <- data.frame(
  category = c("A", "B", "C", "D", "E"),
  value = runif(5) * 10
)

p <- ggplot(data, aes(x = category, y = value)) +
  geom_bar(stat = "identity", fill = "steelblue") +
  labs(title = "Simple Bar Chart", x = "Categories", y = "Values") +
  theme_minimal()

print(p)
"#,
        ),
        (
            "sine_wave.R",
            r#"
library(plotly)

x <- seq(0, 10, length.out = 100)
y <- sin(x)
data <- data.frame(x = x, y = y)

p <- plot_ly(data, x = ~x, y = ~y, type = 'scatter', mode = 'lines',
             line = list(color = 'blue')) %>%
  layout(title = 'Interactive Sine Wave',
         xaxis = list(title = 'X'),
         yaxis = list(title = 'sin(X)'))

print(p)
"#,
        ),
    ]
}
