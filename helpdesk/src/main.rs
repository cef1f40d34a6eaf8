//! Helpdesk command-line client: signs in, then lists, triages, counts,
//! exports or watches tickets on the managed backend.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use zeroize::Zeroizing;

use helpdesk::HelpdeskSettings;
use helpdesk::domain::report::local_day_window;
use helpdesk::domain::{
    ChangeBus, DashboardService, DateWindow, ExportWindow, FeedSnapshot, GatewayConnectionService,
    LoginCredentials, NotificationListener, QueueService, ReportService, SessionContext,
    SessionService, TicketFeed, TicketPageQuery, TicketSummary,
};
use helpdesk::outbound::evolution::EvolutionHttpGateway;
use helpdesk::outbound::notify::{ChannelNotifier, TracingNotifier};
use helpdesk::outbound::realtime::RealtimeFeed;
use helpdesk::outbound::report_file::write_report;
use helpdesk::outbound::rest::{
    RestAuthGateway, RestClient, RestGatewayConfigRepository, RestTicketRepository,
    RestUserRepository,
};

const PASSWORD_VAR: &str = "HELPDESK_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "helpdesk", version, about = "Helpdesk ticket client")]
struct Cli {
    /// Sign-in email. The password is read from HELPDESK_PASSWORD.
    #[arg(long)]
    email: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List one page of tickets, newest first.
    Tickets {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// First local day to include.
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last local day to include.
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Show the triage queue.
    Queue,
    /// Count tickets by status for one day (today by default).
    Dashboard {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Export tickets created between two local days to CSV.
    Export {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Follow ticket changes and print notifications until Ctrl-C.
    Watch,
    /// Manage the WhatsApp gateway connection.
    Gateway {
        #[command(subcommand)]
        action: GatewayAction,
    },
}

#[derive(Debug, Subcommand)]
enum GatewayAction {
    /// Probe, store and list instances of a gateway server.
    Configure {
        #[arg(long)]
        url: String,
        #[arg(long)]
        api_key: String,
    },
    /// List instances on the stored gateway server.
    Instances,
}

struct Backend {
    client: Arc<RestClient>,
    auth: Arc<RestAuthGateway>,
    users: Arc<RestUserRepository>,
    tickets: Arc<RestTicketRepository>,
    gateway_configs: Arc<RestGatewayConfigRepository>,
}

impl Backend {
    fn connect(settings: &HelpdeskSettings) -> color_eyre::Result<Self> {
        let client = Arc::new(
            RestClient::new(
                settings.backend_url()?,
                settings.anon_key()?,
                settings.request_timeout()?,
            )
            .wrap_err("failed to build HTTP client")?,
        );
        Ok(Self {
            auth: Arc::new(RestAuthGateway::new(Arc::clone(&client))),
            users: Arc::new(RestUserRepository::new(Arc::clone(&client))),
            tickets: Arc::new(RestTicketRepository::new(Arc::clone(&client))),
            gateway_configs: Arc::new(RestGatewayConfigRepository::new(Arc::clone(&client))),
            client,
        })
    }
}

/// Application bootstrap.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let settings = HelpdeskSettings::load_from_iter([OsString::from("helpdesk")])
        .map_err(|err| eyre!("failed to load configuration: {err}"))?;
    let backend = Backend::connect(&settings)?;
    let context = Arc::new(SessionContext::new());
    let session = SessionService::new(
        Arc::clone(&backend.auth),
        Arc::clone(&backend.users),
        Arc::clone(&context),
    );

    let password = Zeroizing::new(
        std::env::var(PASSWORD_VAR).wrap_err_with(|| format!("{PASSWORD_VAR} is not set"))?,
    );
    let credentials = LoginCredentials::try_from_parts(&cli.email, &password)?;
    session.login(&credentials).await?;

    let outcome = run(cli.command, &settings, &backend, &context).await;
    session.logout().await;
    outcome
}

async fn run(
    command: Command,
    settings: &HelpdeskSettings,
    backend: &Backend,
    context: &Arc<SessionContext>,
) -> color_eyre::Result<()> {
    let offset = settings.utc_offset()?;
    let mut out = io::stdout();
    match command {
        Command::Tickets { page, from, to } => {
            let query = TicketPageQuery {
                request: settings.first_page()?.with_page(page)?,
                window: listing_window(from, to, offset)?,
            };
            let feed = TicketFeed::new(Arc::clone(&backend.tickets), query);
            print_page(&mut out, &feed.refetch().await?)?;
        }
        Command::Queue => {
            let queue = QueueService::new(Arc::clone(&backend.tickets), Arc::clone(context));
            for entry in queue.queue().await? {
                writeln!(out, "{:>3}. {}", entry.position, ticket_line(&entry.summary))?;
            }
        }
        Command::Dashboard { date } => {
            let dashboard = DashboardService::new(
                Arc::clone(&backend.tickets),
                Arc::clone(context),
                Arc::new(DefaultClock),
                offset,
            );
            let day = date.unwrap_or_else(|| dashboard.today());
            let counts = dashboard.counts_for_day(day).await?;
            writeln!(out, "{day}")?;
            writeln!(out, "  open         {}", counts.open)?;
            writeln!(out, "  in progress  {}", counts.in_progress)?;
            writeln!(out, "  closed       {}", counts.closed)?;
            writeln!(out, "  reopened     {}", counts.reopened)?;
        }
        Command::Export { from, to, out_dir } => {
            let window = ExportWindow::new(from, to, offset)?;
            let reports = ReportService::new(
                Arc::clone(&backend.tickets),
                Arc::new(TracingNotifier),
                Arc::clone(context),
            );
            match reports.export(&window).await? {
                Some(report) => {
                    let path = write_report(&out_dir, &report)
                        .wrap_err_with(|| format!("failed to write {}", report.file_name))?;
                    writeln!(out, "{} tickets written to {}", report.row_count, path.display())?;
                }
                None => writeln!(out, "No tickets found for the selected period")?,
            }
        }
        Command::Watch => watch(settings, backend, context, offset).await?,
        Command::Gateway { action } => {
            let service = GatewayConnectionService::new(
                Arc::clone(&backend.gateway_configs),
                Arc::new(EvolutionHttpGateway::new(settings.request_timeout()?)?),
                Arc::clone(context),
                Arc::new(DefaultClock),
            );
            let instances = match action {
                GatewayAction::Configure { url, api_key } => {
                    service.configure(&url, &api_key).await?.instances
                }
                GatewayAction::Instances => service.instances().await?,
            };
            for instance in instances {
                writeln!(
                    out,
                    "{}  {}  {}",
                    instance.instance_name,
                    instance.status,
                    instance.profile_name.as_deref().unwrap_or("-")
                )?;
            }
        }
    }
    Ok(())
}

async fn watch(
    settings: &HelpdeskSettings,
    backend: &Backend,
    context: &Arc<SessionContext>,
    offset: FixedOffset,
) -> color_eyre::Result<()> {
    let realtime = RealtimeFeed::for_project(
        Arc::clone(&backend.client),
        settings.realtime_url()?.as_ref(),
        settings.heartbeat()?,
        settings.request_timeout()?,
    )?;
    let bus = Arc::new(ChangeBus::new(Arc::new(realtime)));
    let (notifier, mut notifications) = ChannelNotifier::new();
    let notifier = Arc::new(notifier);

    let feed = Arc::new(TicketFeed::new(
        Arc::clone(&backend.tickets),
        TicketPageQuery {
            request: settings.first_page()?,
            window: DateWindow::unbounded(),
        },
    ));
    print_page(&mut io::stdout(), &feed.refetch().await?)?;
    let mut pages = feed.pages();
    let _feed_watch = feed.watch(bus.as_ref(), Arc::clone(&notifier)).await?;
    let _listener =
        NotificationListener::new(Arc::clone(context), Arc::clone(&bus), notifier).spawn();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.wrap_err("failed to listen for Ctrl-C")?;
                break;
            }
            Ok(()) = pages.changed() => {
                let page = pages.borrow_and_update().clone();
                print_page(&mut io::stdout(), &page)?;
            }
            Some(notification) = notifications.recv() => {
                let now = chrono::Utc::now().with_timezone(&offset);
                writeln!(io::stdout(), "{} {notification}", now.format("%H:%M:%S"))?;
            }
        }
    }
    Ok(())
}

fn listing_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    offset: FixedOffset,
) -> color_eyre::Result<DateWindow> {
    let start = from
        .map(|day| local_day_window(day, day, offset))
        .transpose()?
        .and_then(|window| window.start());
    let end = to
        .map(|day| local_day_window(day, day, offset))
        .transpose()?
        .and_then(|window| window.end());
    Ok(DateWindow::new(start, end)?)
}

fn ticket_line(summary: &TicketSummary) -> String {
    let name = |party: &Option<helpdesk::domain::PartyRef>| {
        party
            .as_ref()
            .map_or_else(|| "-".to_owned(), |party| party.name.clone())
    };
    format!(
        "{}  {:<12} {}  (requester: {}, technician: {})",
        summary.ticket.id,
        summary.ticket.status.label(),
        summary.ticket.title,
        name(&summary.requester),
        name(&summary.technician),
    )
}

fn print_page(out: &mut impl Write, snapshot: &FeedSnapshot) -> io::Result<()> {
    for summary in &snapshot.tickets {
        writeln!(out, "{}", ticket_line(summary))?;
    }
    writeln!(
        out,
        "page {} of {} ({} tickets)",
        snapshot.current_page, snapshot.total_pages, snapshot.total_count
    )
}
