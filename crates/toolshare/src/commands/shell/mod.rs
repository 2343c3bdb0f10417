mod actions;
pub mod parse;

use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use toolshare_core::notify::{
    NotificationTransport, PromptRequest, TerminalPrompt, parse_answer, transport_for,
};
use toolshare_core::{Bus, DurableStore, NotificationGateway, Origin, PermissionState};
use toolshare_tools::Toolbox;

use super::Command;
use crate::error::Error;
use crate::settings::Settings;
use parse::{HELP, ShellInput, parse_line};

pub struct ShellCommand {
    pub instances: usize,
    pub settings: Settings,
}

#[async_trait]
impl Command for ShellCommand {
    async fn execute(&self) -> Result<()> {
        let interactive = std::io::stdin().is_terminal();
        let mut stdout = std::io::stdout();
        self.run(
            BufReader::new(tokio::io::stdin()),
            &mut stdout,
            interactive,
            transport_for(self.settings.transport),
        )
        .await
    }
}

impl ShellCommand {
    async fn run<R, W>(
        &self,
        input: R,
        out: &mut W,
        interactive: bool,
        transport: Arc<dyn NotificationTransport>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        if self.instances == 0 {
            return Err(Error::Config("--instances must be at least 1".to_string()).into());
        }

        let store: Arc<dyn DurableStore> =
            Arc::new(self.settings.open_store().map_err(Error::from)?);
        let (prompt, prompts) = TerminalPrompt::channel();
        let gateway = Arc::new(NotificationGateway::new(
            self.settings.permission,
            Arc::new(prompt),
            transport,
        ));

        let origin = Origin::new(self.settings.channel_capacity);
        let mut toolboxes = Vec::with_capacity(self.instances);
        let mut listeners: Vec<JoinHandle<()>> = Vec::with_capacity(self.instances);
        for _ in 0..self.instances {
            let (bus, listener) = Bus::connect(&origin);
            toolboxes.push(Toolbox::new(bus, Arc::clone(&store), Arc::clone(&gateway)));
            listeners.push(listener.spawn());
        }
        tracing::info!(
            instances = self.instances,
            store = %self.settings.store_dir.display(),
            transport = gateway.transport_name(),
            "Shell started"
        );

        let mut session = Session {
            lines: input.lines(),
            out,
            prompts,
            carried: None,
        };
        writeln!(
            session.out,
            "{} instances attached, store at {}. Type `help` for commands.",
            self.instances,
            self.settings.store_dir.display()
        )?;

        if gateway.permission() == PermissionState::Default {
            session.serve(gateway.request_permission()).await?;
        }

        loop {
            if interactive {
                write!(session.out, "> ")?;
                session.out.flush()?;
            }

            let Some(line) = session.next_line().await? else {
                break;
            };

            match parse_line(&line) {
                Ok(None) => {}
                Ok(Some(ShellInput::Quit)) => break,
                Ok(Some(ShellInput::Help)) => writeln!(session.out, "{HELP}")?,
                Ok(Some(ShellInput::Instances)) => {
                    for (n, tools) in toolboxes.iter().enumerate() {
                        writeln!(session.out, "{}  {}", n + 1, tools.instance_id())?;
                    }
                }
                Ok(Some(ShellInput::Run { instance, action })) => {
                    let Some(tools) = toolboxes.get(instance - 1) else {
                        writeln!(
                            session.out,
                            "error: no instance {instance}, {} attached",
                            self.instances
                        )?;
                        continue;
                    };
                    match session.serve(actions::perform(tools, action)).await? {
                        Ok(output) => writeln!(session.out, "[{instance}] {output}")?,
                        Err(e) => {
                            tracing::debug!(instance, "Shell action failed: {e}");
                            writeln!(session.out, "[{instance}] error: {e}")?;
                        }
                    }
                }
                Err(e) => writeln!(session.out, "error: {e}")?,
            }
        }

        drop(toolboxes);
        for listener in listeners {
            listener.abort();
        }
        tracing::info!("Shell finished");
        Ok(())
    }
}

/// Owns the shell's input. Permission prompts raised anywhere in the process
/// are asked here, between commands or while a command waits on one.
struct Session<'a, R, W> {
    lines: Lines<R>,
    out: &'a mut W,
    prompts: mpsc::Receiver<PromptRequest>,
    /// Line typed at a prompt that turned out to be a command.
    carried: Option<String>,
}

impl<R, W> Session<'_, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.carried.take() {
                return Ok(Some(line));
            }
            tokio::select! {
                Some(request) = self.prompts.recv() => self.answer(request).await?,
                line = self.lines.next_line() => return line,
            }
        }
    }

    /// Drive `work` to completion, answering any prompt raised meanwhile.
    async fn serve<F: Future>(&mut self, work: F) -> io::Result<F::Output> {
        tokio::pin!(work);
        loop {
            tokio::select! {
                output = &mut work => return Ok(output),
                Some(request) = self.prompts.recv() => self.answer(request).await?,
            }
        }
    }

    async fn answer(&mut self, request: PromptRequest) -> io::Result<()> {
        if self.carried.is_some() {
            // A command is already waiting to run; don't take another line.
            request.resolve(PermissionState::Default);
            return Ok(());
        }

        writeln!(self.out, "{} [y/N]", request.question())?;
        self.out.flush()?;
        let Some(line) = self.lines.next_line().await? else {
            request.resolve(PermissionState::Default);
            return Ok(());
        };

        match parse_answer(&line) {
            Some(decision) => {
                writeln!(self.out, "Notifications: {decision}")?;
                request.resolve(decision);
            }
            None => {
                writeln!(self.out, "Notifications: not decided yet")?;
                request.resolve(PermissionState::Default);
                self.carried = Some(line);
            }
        }
        Ok(())
    }
}
