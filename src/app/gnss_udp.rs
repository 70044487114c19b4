use log::{error, info};

use super::{set_led, Context, Error, BUTTON_POLL_INTERVAL};
use crate::board::{Button, Buttons, Led, Leds};
use crate::config::Config;
use crate::gnss::{format_position, gnss_init_and_start, FixTracker, Gnss, POSITION_LEN};
use crate::modem::LinkController;
use crate::network::application::echo::MESSAGE_SIZE;
use crate::network::error::Error as NetworkError;
use crate::network::{server_resolve, Datagram, DatagramStack, Resolve};
use crate::system::fmt::printable;
use crate::system::{Clock, Delay};

impl<L, N, Ld, B, D> Context<L, N, Ld, B, D>
where
    L: LinkController,
    N: Resolve + DatagramStack,
    Ld: Leds,
    B: Buttons,
    D: Delay,
{
    /// The GNSS sample.
    ///
    /// Attaches to LTE, opens a UDP socket to the echo server and starts
    /// periodic GNSS fixes. LED 1 lights on every fix. Button 1 sends the
    /// latest position as text; replies are logged.
    ///
    /// Returns `Ok(())` when the server sends an empty datagram, and an error
    /// when setup or the socket fails.
    pub fn run_gnss_udp<G, K>(
        &mut self,
        gnss: &mut G,
        fixes: &'static FixTracker<K>,
        config: &Config<'_>,
    ) -> Result<(), Error>
    where
        G: Gnss,
        K: Clock + Sync,
    {
        let echo = &config.echo;
        self.lte_connect(&config.link)?;
        let server = server_resolve(&mut self.net, echo.server_hostname, echo.udp_port)
            .inspect_err(|_| info!("Failed to resolve server name"))?;
        let mut socket = self
            .net
            .open(server, None)
            .inspect_err(|_| info!("Failed to initialize client"))?;

        gnss_init_and_start(&mut self.link, gnss, fixes, &config.gnss)
            .inspect_err(|_| error!("Failed to initialize and start GNSS"))?;

        let mut buf = [0u8; MESSAGE_SIZE];
        let result = loop {
            if fixes.fix_signal().try_take() {
                set_led(&mut self.leds, Led::Led1, true);
            }
            if let Err(e) = send_position(&mut self.buttons, &mut socket, fixes) {
                break Err(e);
            }

            match socket.recv(&mut buf[..MESSAGE_SIZE - 1], Some(BUTTON_POLL_INTERVAL)) {
                Ok(0) => break Ok(()),
                Ok(len) => info!(
                    "Data received from the server: ({})",
                    printable::<MESSAGE_SIZE>(&buf[..len])
                ),
                Err(NetworkError::Timeout | NetworkError::WouldBlock) => {}
                Err(e) => {
                    error!("Socket error: {}, exit", e);
                    break Err(e);
                }
            }
        };

        if let Err(e) = socket.close() {
            error!("Failed to close socket: {}", e);
        }
        result.map_err(Error::from)
    }
}

fn send_position<B, S, K>(
    buttons: &mut B,
    socket: &mut S,
    fixes: &FixTracker<K>,
) -> Result<(), NetworkError>
where
    B: Buttons,
    S: Datagram,
    K: Clock,
{
    while let Some(press) = buttons.poll_event() {
        if !press.pressed(Button::Button1) {
            continue;
        }
        let Some(fix) = fixes.current_fix() else {
            info!("No fix yet, nothing to send");
            continue;
        };
        let position = format_position::<POSITION_LEN>(&fix);
        socket
            .send(position.as_bytes())
            .inspect_err(|e| info!("Failed to send message, {}", e))?;
    }
    Ok(())
}
