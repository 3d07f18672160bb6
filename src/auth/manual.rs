//! Manual authorization-code entry.

use std::future::Future;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use super::capture::{CaptureError, CodeCapture, extract_code, interrupt_signal};

/// Inputs at least this long that contain `http` are treated as URLs.
const URL_LIKE_MIN_LEN: usize = 50;

/// Classification of one line typed at the manual prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualInput {
    /// A usable authorization code.
    Code(String),
    /// A URL without a `code` parameter.
    MissingCode {
        /// The URL looks like the login flow's intermediate redirect page.
        intermediate_redirect: bool,
    },
    /// Empty line.
    Blank,
}

/// Classifies a pasted line.
#[must_use]
pub fn interpret_manual_input(input: &str) -> ManualInput {
    let input = input.trim();
    if input.is_empty() {
        return ManualInput::Blank;
    }
    if let Some(code) = extract_code(input) {
        return ManualInput::Code(code);
    }
    if input.len() > URL_LIKE_MIN_LEN && input.contains("http") {
        return ManualInput::MissingCode {
            intermediate_redirect: input.contains("post-redirect"),
        };
    }
    ManualInput::Code(input.to_string())
}

type InterruptFactory = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Prompts on a writer and reads pasted URLs or codes from a reader.
pub struct ManualCapture<R, W> {
    reader: R,
    writer: W,
    interrupt: InterruptFactory,
}

impl ManualCapture<BufReader<Stdin>, Stdout> {
    /// Prompt on stdout, read from stdin, abort on Ctrl-C.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .with_interrupt(interrupt_signal)
    }
}

impl<R, W> ManualCapture<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Prompt over arbitrary streams with no interrupt source.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            interrupt: Box::new(|| std::future::pending::<()>().boxed()),
        }
    }

    /// Installs an interrupt source. Each capture call creates a fresh future.
    #[must_use]
    pub fn with_interrupt<F, Fut>(mut self, make: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.interrupt = Box::new(move || make().boxed());
        self
    }

    /// Consumes the capture and returns its writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    async fn write(&mut self, text: &str) -> Result<(), CaptureError> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn prompt_loop(&mut self, authorize_url: &str) -> Result<String, CaptureError> {
        self.write(&format!(
            "\n--- Manual login ---\n\
             1. Open the following URL in your browser:\n{authorize_url}\n\
             2. Log in with your pixiv account.\n\
             3. After logging in you will land on a blank or error page.\n\
             4. Copy the entire URL from the address bar and paste it below.\n"
        ))
        .await?;

        let mut line = String::new();
        loop {
            self.write("Paste URL or code here: ").await?;
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(CaptureError::Aborted);
            }

            match interpret_manual_input(&line) {
                ManualInput::Code(code) => return Ok(code),
                ManualInput::Blank => {}
                ManualInput::MissingCode {
                    intermediate_redirect,
                } => {
                    let mut message = String::from(
                        "\n[!] The URL you pasted does not contain the 'code' parameter.\n    \
                         Copy the final callback URL after logging in; it looks like .../callback?code=...\n",
                    );
                    if intermediate_redirect {
                        message.push_str(
                            "    This is the intermediate redirect page. Let it finish loading, or click its link if it is stuck.\n",
                        );
                    }
                    message.push_str("    Try again:\n\n");
                    self.write(&message).await?;
                }
            }
        }
    }
}

impl<R, W> std::fmt::Debug for ManualCapture<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualCapture").finish_non_exhaustive()
    }
}

#[async_trait]
impl<R, W> CodeCapture for ManualCapture<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn capture(&mut self, authorize_url: &str) -> Result<String, CaptureError> {
        let interrupt = (self.interrupt)();
        tokio::select! {
            () = interrupt => Err(CaptureError::Aborted),
            result = self.prompt_loop(authorize_url) => result,
        }
    }
}
