use core::convert::Infallible;

use log::{error, info};

use super::{Context, Error, BUTTON_POLL_INTERVAL};
use crate::board::{Button, Buttons, Leds};
use crate::config::Config;
use crate::modem::LinkController;
use crate::network::application::echo::{EchoClient, Received};
use crate::network::error::Error as NetworkError;
use crate::network::{server_resolve, Connect, Connection, Read, Resolve};
use crate::system::Delay;

impl<L, N, Ld, B, D> Context<L, N, Ld, B, D>
where
    L: LinkController,
    N: Resolve + Connect,
    Ld: Leds,
    B: Buttons,
    D: Delay,
{
    /// The TCP echo sample.
    ///
    /// Attaches to LTE and connects to the echo server. Button 1 sends the
    /// configured message and everything the server returns is logged. When
    /// the server closes the connection a new one is opened. Reads wait at
    /// most [`BUTTON_POLL_INTERVAL`] so presses are seen while the server is
    /// quiet.
    ///
    /// Returns only on failure.
    pub fn run_tcp_echo(&mut self, config: &Config<'_>) -> Result<Infallible, Error> {
        let echo = &config.echo;
        self.lte_connect(&config.link)?;
        let server = server_resolve(&mut self.net, echo.server_hostname, echo.tcp_port)
            .inspect_err(|_| info!("Failed to resolve server name"))?;

        loop {
            let mut connection = self
                .net
                .connect(server, None)
                .inspect_err(|_| info!("Failed to initialize client"))?;
            info!("Successfully connected to server");
            connection
                .set_read_timeout(Some(BUTTON_POLL_INTERVAL))
                .map_err(Into::<NetworkError>::into)
                .inspect_err(|e| error!("Failed to set receive timeout: {}", e))?;

            let mut client = EchoClient::new(connection);
            let served = serve(&mut client, &mut self.buttons, echo.message.as_bytes());
            if let Err(e) = client.close() {
                error!("Failed to close connection: {}", e);
            }
            served?;
        }
    }
}

/// Serve one connection until the server closes it.
fn serve<C, B>(client: &mut EchoClient<C>, buttons: &mut B, message: &[u8]) -> Result<(), Error>
where
    C: Connection,
    B: Buttons,
{
    loop {
        while let Some(press) = buttons.poll_event() {
            if press.pressed(Button::Button1) {
                client.send(message)?;
            }
        }

        match client.receive() {
            Ok(Received::Closed) => return Ok(()),
            Ok(Received::Data(_)) | Ok(Received::Idle) => {}
            Err(e) => return Err(e.into()),
        }
    }
}
