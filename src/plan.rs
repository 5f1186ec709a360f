use std::borrow::Cow;
use std::time::Duration;

use serde::Serialize;
use shell_escape::unix::escape;

/// What to deploy and where it lives on the server.
///
/// # Example
///
/// ```
/// use provisio::Target;
///
/// let target = Target::new("https://github.com/acme/hub.git")
///     .base_dir("/srv/hub")
///     .app_name("hub")
///     .health_port(8080);
///
/// assert_eq!(target.app_dir(), "/srv/hub/app");
/// assert_eq!(target.health_url(), "http://localhost:8080/api/health");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub repo_url: String,
    pub base_dir: String,
    /// PM2 process name and Nginx site name.
    pub app_name: String,
    pub node_major: u32,
    /// npm package installed globally alongside the app.
    pub global_package: String,
    pub health_port: u16,
    pub health_path: String,
}

impl Target {
    #[must_use]
    pub fn new(repo_url: &str) -> Self {
        Self {
            repo_url: repo_url.to_string(),
            base_dir: "/opt/claude-dev-hub".to_string(),
            app_name: "claude-dev-hub".to_string(),
            node_major: 20,
            global_package: "@anthropic-ai/claude-code".to_string(),
            health_port: 3001,
            health_path: "/api/health".to_string(),
        }
    }

    #[must_use]
    pub fn base_dir(mut self, dir: &str) -> Self {
        self.base_dir = dir.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = name.to_string();
        self
    }

    #[must_use]
    pub const fn node_major(mut self, major: u32) -> Self {
        self.node_major = major;
        self
    }

    #[must_use]
    pub fn global_package(mut self, package: &str) -> Self {
        self.global_package = package.to_string();
        self
    }

    #[must_use]
    pub const fn health_port(mut self, port: u16) -> Self {
        self.health_port = port;
        self
    }

    #[must_use]
    pub fn health_path(mut self, path: &str) -> Self {
        self.health_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self
    }

    /// Directory the repository is cloned into.
    #[must_use]
    pub fn app_dir(&self) -> String {
        format!("{}/app", self.base_dir)
    }

    #[must_use]
    pub fn health_url(&self) -> String {
        format!("http://localhost:{}{}", self.health_port, self.health_path)
    }
}

/// A single remote command and how long it may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub command: String,
    pub timeout_secs: u64,
}

impl Step {
    #[must_use]
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            timeout_secs,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A numbered group of steps announced with one progress line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phase {
    pub title: String,
    pub steps: Vec<Step>,
}

impl Phase {
    fn new(title: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            title: title.into(),
            steps,
        }
    }
}

/// The full provisioning sequence for one [`Target`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub phases: Vec<Phase>,
    /// Always issued last, after every phase.
    pub health_check: Step,
}

impl Plan {
    #[must_use]
    pub fn for_target(target: &Target) -> Self {
        let base = target.base_dir.as_str();
        let app = quote(&target.app_dir());
        let name = quote(&target.app_name);
        let package = quote(&target.global_package);
        let repo = quote(&target.repo_url);
        let major = target.node_major;

        let phases = vec![
            Phase::new(
                "Updating system packages",
                vec![Step::new(
                    "apt update && DEBIAN_FRONTEND=noninteractive apt upgrade -y 2>&1 | tail -20",
                    600,
                )],
            ),
            Phase::new(
                format!("Installing Node.js {major}.x"),
                vec![
                    Step::new(
                        format!(
                            "curl -fsSL https://deb.nodesource.com/setup_{major}.x | bash - 2>&1 | tail -5"
                        ),
                        120,
                    ),
                    Step::new("apt install -y nodejs 2>&1 | tail -5", 120),
                ],
            ),
            Phase::new(
                "Installing build essentials",
                vec![Step::new(
                    "apt install -y build-essential python3 2>&1 | tail -5",
                    120,
                )],
            ),
            Phase::new(
                "Installing Git",
                vec![Step::new("apt install -y git 2>&1 | tail -3", 60)],
            ),
            Phase::new(
                "Installing PM2",
                vec![Step::new("npm install -g pm2 2>&1 | tail -5", 120)],
            ),
            Phase::new(
                format!("Installing {}", target.global_package),
                vec![Step::new(
                    format!("npm install -g {package} 2>&1 | tail -5"),
                    180,
                )],
            ),
            Phase::new(
                "Installing Nginx",
                vec![Step::new("apt install -y nginx 2>&1 | tail -5", 120)],
            ),
            Phase::new(
                "Cloning repository",
                vec![
                    Step::new(
                        format!(
                            "mkdir -p {} {}",
                            quote(&format!("{base}/projects")),
                            quote(&format!("{base}/data"))
                        ),
                        300,
                    ),
                    Step::new(format!("rm -rf {app} && git clone {repo} {app} 2>&1"), 120),
                ],
            ),
            Phase::new(
                "Installing dependencies and building",
                vec![
                    Step::new(format!("cd {app} && npm install 2>&1 | tail -10"), 300),
                    Step::new(format!("cd {app} && npm run build 2>&1 | tail -10"), 300),
                ],
            ),
            Phase::new(
                "Configuring and starting services",
                vec![
                    Step::new(
                        format!("cp {app}/nginx.conf /etc/nginx/sites-available/{name}"),
                        300,
                    ),
                    Step::new(
                        format!(
                            "ln -sf /etc/nginx/sites-available/{name} /etc/nginx/sites-enabled/"
                        ),
                        300,
                    ),
                    Step::new("rm -f /etc/nginx/sites-enabled/default", 300),
                    Step::new("nginx -t && systemctl restart nginx", 300),
                    Step::new(
                        format!(
                            "cd {app} && pm2 delete {name} 2>/dev/null; \
                             pm2 start ecosystem.config.js 2>&1 | tail -5"
                        ),
                        300,
                    ),
                    Step::new("pm2 save", 300),
                ],
            ),
        ];

        Self {
            phases,
            health_check: Step::new(format!("curl -s {}", quote(&target.health_url())), 300),
        }
    }

    /// Every phase step in execution order, health check excluded.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.phases.iter().flat_map(|phase| phase.steps.iter())
    }

    /// Number of commands a full run dispatches, health check
    /// included.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.steps().count() + 1
    }
}

fn quote(raw: &str) -> String {
    escape(Cow::Borrowed(raw)).into_owned()
}
