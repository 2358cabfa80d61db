//! `docker run` invocation description.

/// How the container is attached to the invoking process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Run in the foreground until the container exits.
    #[default]
    Foreground,
    /// Foreground with stdin attached, removed on exit (`-i --rm`).
    Interactive,
    /// Detached with stdin kept open (`-id`); prints the container id.
    Detached,
}

/// Everything needed to render a `docker run` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub mode: RunMode,
    /// Bind mounts: (host_path, container_path).
    pub volumes: Vec<(String, String)>,
    /// Environment variables: (name, value).
    pub env: Vec<(String, String)>,
    /// Arguments passed to the image entrypoint.
    pub args: Vec<String>,
}

impl RunSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            mode: RunMode::default(),
            volumes: Vec::new(),
            env: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn volume(mut self, host: impl Into<String>, container: impl Into<String>) -> Self {
        self.volumes.push((host.into(), container.into()));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments after the runtime binary, starting with `run`.
    pub fn to_args(&self) -> Vec<String> {
        let mut out = vec!["run".to_string()];

        match self.mode {
            RunMode::Foreground => {}
            RunMode::Interactive => {
                out.push("-i".to_string());
                out.push("--rm".to_string());
            }
            RunMode::Detached => out.push("-id".to_string()),
        }

        for (host, container) in &self.volumes {
            out.push("-v".to_string());
            out.push(format!("{}:{}", host, container));
        }
        for (name, value) in &self.env {
            out.push("-e".to_string());
            out.push(format!("{}={}", name, value));
        }

        out.push(self.image.clone());
        out.extend(self.args.iter().cloned());
        out
    }
}
