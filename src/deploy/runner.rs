//! Core deploy runner
//!
//! One runner executes the same fixed sequence on every configured host, in
//! order: enter the site directory, pull the latest revision, then run the
//! build command - inside an `rvm use` scope when a Ruby version is pinned.

use crate::config::Config;
use crate::error::FerryResult;
use crate::remote::{scoped, RemoteShell, SshShell};

use super::options::DeployOptions;

/// The update step is fixed: every deploy starts by pulling the site repo.
const PULL_COMMAND: &str = "git pull";

/// Progress events emitted while a deploy runs
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// A host's sequence is starting
    HostStarted { host: String },
    /// A scope command was issued and entered
    ScopeEntered { command: String },
    /// A command completed, with its captured stdout
    CommandRun { command: String, output: String },
    /// A host's sequence completed
    HostFinished { host: String, commands: usize },
    /// A command that a dry run would have issued
    Planned { command: String },
}

/// Summary of a completed deploy
#[derive(Debug, Default)]
pub struct DeployReport {
    /// Hosts deployed, in order
    pub hosts: Vec<String>,
    /// Total commands issued across all hosts
    pub commands: usize,
}

/// Deploy runner: the configured sequence plus its execution
pub struct DeployRunner {
    config: Config,
    options: DeployOptions,
}

impl DeployRunner {
    /// Create a new deploy runner
    pub fn new(config: Config, options: DeployOptions) -> Self {
        Self { config, options }
    }

    /// The ordered logical commands issued on each host
    pub fn plan(&self) -> Vec<String> {
        let site = &self.config.site;
        let mut commands = vec![format!("cd {}", site.path), PULL_COMMAND.to_string()];
        if let Some(version) = &site.ruby {
            commands.push(format!("rvm use {}", version));
        }
        commands.push(site.build.clone());
        commands
    }

    /// Run the deploy operation
    pub fn run(&self) -> FerryResult<DeployReport> {
        self.run_with_callback::<fn(DeployEvent)>(None)
    }

    /// Run the deploy operation with a callback for progress events
    pub fn run_with_callback<F>(&self, callback: Option<F>) -> FerryResult<DeployReport>
    where
        F: FnMut(DeployEvent),
    {
        self.run_hosts(|host| SshShell::new(host), callback)
    }

    /// Host loop, generic over how a shell is opened so tests can inject one
    fn run_hosts<S, M, F>(&self, mut connect: M, mut callback: Option<F>) -> FerryResult<DeployReport>
    where
        S: RemoteShell,
        M: FnMut(&str) -> S,
        F: FnMut(DeployEvent),
    {
        self.config.validate()?;

        if self.options.dry_run {
            for command in self.plan() {
                emit(&mut callback, DeployEvent::Planned { command });
            }
            return Ok(DeployReport::default());
        }

        let mut report = DeployReport::default();
        for host in &self.config.hosts {
            emit(&mut callback, DeployEvent::HostStarted { host: host.clone() });

            let mut shell = connect(host);
            let issued = self.run_on(&mut shell, &mut callback)?;

            emit(
                &mut callback,
                DeployEvent::HostFinished {
                    host: host.clone(),
                    commands: issued,
                },
            );
            report.hosts.push(host.clone());
            report.commands += issued;
        }

        Ok(report)
    }

    /// Execute the sequence on one connected shell; returns the number of
    /// commands issued. The first failure aborts the rest of the sequence.
    pub fn run_on<S, F>(&self, shell: &mut S, callback: &mut Option<F>) -> FerryResult<usize>
    where
        S: RemoteShell + ?Sized,
        F: FnMut(DeployEvent),
    {
        let site = &self.config.site;
        let mut issued = 0usize;

        let enter_dir = format!("cd {}", site.path);
        scoped(shell, &enter_dir, |shell| {
            issued += 1;
            emit(
                callback,
                DeployEvent::ScopeEntered {
                    command: enter_dir.clone(),
                },
            );

            let output = shell.run(PULL_COMMAND)?;
            issued += 1;
            emit(
                callback,
                DeployEvent::CommandRun {
                    command: PULL_COMMAND.to_string(),
                    output,
                },
            );

            match &site.ruby {
                Some(version) => {
                    let enter_ruby = format!("rvm use {}", version);
                    scoped(shell, &enter_ruby, |shell| {
                        issued += 1;
                        emit(
                            callback,
                            DeployEvent::ScopeEntered {
                                command: enter_ruby.clone(),
                            },
                        );

                        let output = shell.run(&site.build)?;
                        issued += 1;
                        emit(
                            callback,
                            DeployEvent::CommandRun {
                                command: site.build.clone(),
                                output,
                            },
                        );
                        Ok(())
                    })
                }
                None => {
                    let output = shell.run(&site.build)?;
                    issued += 1;
                    emit(
                        callback,
                        DeployEvent::CommandRun {
                            command: site.build.clone(),
                            output,
                        },
                    );
                    Ok(())
                }
            }
        })?;

        Ok(issued)
    }
}

fn emit<F>(callback: &mut Option<F>, event: DeployEvent)
where
    F: FnMut(DeployEvent),
{
    if let Some(cb) = callback.as_mut() {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::error::FerryError;
    use crate::remote::{RecordingShell, RemoteError};

    fn config(hosts: &[&str], path: &str, build: &str, ruby: Option<&str>) -> Config {
        Config {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            site: SiteConfig {
                path: path.to_string(),
                build: build.to_string(),
                ruby: ruby.map(|r| r.to_string()),
            },
        }
    }

    fn runner(config: Config) -> DeployRunner {
        DeployRunner::new(config, DeployOptions::default())
    }

    fn no_callback() -> Option<fn(DeployEvent)> {
        None
    }

    #[test]
    fn direct_build_trace() {
        let runner = runner(config(
            &["thedevel.webfactional.com"],
            "~/sites/devel.io",
            "jekyll build",
            None,
        ));
        let mut shell = RecordingShell::new();

        let issued = runner.run_on(&mut shell, &mut no_callback()).unwrap();

        assert_eq!(
            shell.trace(),
            vec!["cd ~/sites/devel.io", "git pull", "jekyll build"]
        );
        assert_eq!(issued, 3);
        assert_eq!(shell.open_scopes(), 0);
    }

    #[test]
    fn pinned_ruby_trace() {
        let runner = runner(config(
            &["thedevel.webfactional.com"],
            "~/sites/devel.io",
            "jekyll",
            Some("1.9.3"),
        ));
        let mut shell = RecordingShell::new();

        let issued = runner.run_on(&mut shell, &mut no_callback()).unwrap();

        assert_eq!(
            shell.trace(),
            vec!["cd ~/sites/devel.io", "git pull", "rvm use 1.9.3", "jekyll"]
        );
        assert_eq!(issued, 4);
        assert_eq!(shell.max_scopes(), 2);
        assert_eq!(shell.open_scopes(), 0);
    }

    #[test]
    fn unpinned_run_never_selects_a_ruby() {
        let runner = runner(config(&["h"], "~/site", "jekyll build", None));
        let mut shell = RecordingShell::new();

        runner.run_on(&mut shell, &mut no_callback()).unwrap();

        assert!(shell.trace().iter().all(|c| !c.starts_with("rvm")));
    }

    #[test]
    fn pull_failure_stops_before_the_build() {
        let runner = runner(config(&["h"], "~/site", "jekyll build", None));
        let mut shell = RecordingShell::new().fail_on("git pull", 1);

        let err = runner.run_on(&mut shell, &mut no_callback()).unwrap_err();

        assert_eq!(shell.trace(), vec!["cd ~/site", "git pull"]);
        assert_eq!(shell.open_scopes(), 0);
        match err {
            FerryError::Remote(RemoteError::Command { command, status }) => {
                assert_eq!(command, "git pull");
                assert_eq!(status, 1);
            }
            other => panic!("expected remote command error, got {:?}", other),
        }
    }

    #[test]
    fn directory_failure_stops_the_sequence() {
        let runner = runner(config(&["h"], "~/missing", "jekyll build", None));
        let mut shell = RecordingShell::new().fail_on("cd ~/missing", 2);

        let err = runner.run_on(&mut shell, &mut no_callback()).unwrap_err();

        assert_eq!(shell.trace(), vec!["cd ~/missing"]);
        assert!(matches!(
            err,
            FerryError::Remote(RemoteError::Command { status: 2, .. })
        ));
    }

    #[test]
    fn build_failure_still_releases_the_ruby_scope() {
        let runner = runner(config(&["h"], "~/site", "jekyll", Some("1.9.3")));
        let mut shell = RecordingShell::new().fail_on("jekyll", 2);

        let err = runner.run_on(&mut shell, &mut no_callback()).unwrap_err();

        assert_eq!(
            shell.trace(),
            vec!["cd ~/site", "git pull", "rvm use 1.9.3", "jekyll"]
        );
        assert_eq!(shell.open_scopes(), 0);
        assert!(matches!(err, FerryError::Remote(RemoteError::Command { .. })));
    }

    #[test]
    fn plan_matches_the_issued_trace() {
        for ruby in [None, Some("1.9.3")] {
            let runner = runner(config(&["h"], "~/sites/devel.io", "jekyll build", ruby));
            let mut shell = RecordingShell::new();

            runner.run_on(&mut shell, &mut no_callback()).unwrap();

            assert_eq!(shell.trace(), runner.plan());
        }
    }

    #[test]
    fn hosts_are_deployed_in_order() {
        let runner = runner(config(&["web1", "web2"], "~/site", "jekyll build", None));
        let shell = RecordingShell::new();

        let report = runner
            .run_hosts(|_| shell.clone(), no_callback())
            .unwrap();

        assert_eq!(report.hosts, vec!["web1", "web2"]);
        assert_eq!(report.commands, 6);
        let mut expected = runner.plan();
        expected.extend(runner.plan());
        assert_eq!(shell.trace(), expected);
    }

    #[test]
    fn first_host_failure_leaves_remaining_hosts_untouched() {
        let runner = runner(config(&["web1", "web2"], "~/site", "jekyll build", None));
        let shell = RecordingShell::new().fail_on("git pull", 1);
        let mut opened = 0;

        let result = runner.run_hosts(
            |_| {
                opened += 1;
                shell.clone()
            },
            no_callback(),
        );

        assert!(result.is_err());
        assert_eq!(opened, 1);
        assert_eq!(shell.trace(), vec!["cd ~/site", "git pull"]);
    }

    #[test]
    fn events_follow_the_sequence() {
        let runner = runner(config(&["web1"], "~/site", "jekyll", Some("1.9.3")));
        let shell = RecordingShell::new();
        let mut events = Vec::new();

        runner
            .run_hosts(|_| shell.clone(), Some(|event| events.push(event)))
            .unwrap();

        let summary: Vec<String> = events
            .iter()
            .map(|event| match event {
                DeployEvent::HostStarted { host } => format!("start {}", host),
                DeployEvent::ScopeEntered { command } => format!("enter {}", command),
                DeployEvent::CommandRun { command, .. } => format!("run {}", command),
                DeployEvent::HostFinished { host, commands } => {
                    format!("done {} {}", host, commands)
                }
                DeployEvent::Planned { command } => format!("plan {}", command),
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                "start web1",
                "enter cd ~/site",
                "run git pull",
                "enter rvm use 1.9.3",
                "run jekyll",
                "done web1 4",
            ]
        );
    }

    #[test]
    fn dry_run_issues_nothing() {
        let config = config(&["web1"], "~/site", "jekyll build", None);
        let options = DeployOptions {
            dry_run: true,
            ..DeployOptions::default()
        };
        let runner = DeployRunner::new(config, options);
        let shell = RecordingShell::new();
        let mut planned = Vec::new();

        let report = runner
            .run_hosts(
                |_| shell.clone(),
                Some(|event| {
                    if let DeployEvent::Planned { command } = event {
                        planned.push(command);
                    }
                }),
            )
            .unwrap();

        assert_eq!(planned, runner.plan());
        assert_eq!(report.commands, 0);
        assert!(shell.trace().is_empty());
    }

    #[test]
    fn empty_host_list_is_rejected_before_connecting() {
        let runner = runner(config(&[], "~/site", "jekyll build", None));

        let err = runner.run().unwrap_err();
        assert!(matches!(err, FerryError::NoHosts));
    }
}
