use api_shared::HealthService;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clinic_core::constants::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME, DEFAULT_DATA_DIR};
use clinic_core::{
    AccountService, Admission, AdmissionService, Appointment, AppointmentQuery,
    AppointmentService, BootstrapOutcome, CoreConfig, JsonFileStore, NewAdmission,
    NewAppointment, Priority, TransitionPolicy, TriageCompletion, UserAccount, VisitCompletion,
};
use clinic_types::{NonEmptyText, PhoneNumber};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic registration and admission CLI")]
struct Cli {
    /// Record storage directory (falls back to CLINIC_DATA_DIR, then "clinic_data")
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Transition policy: permissive or strict (falls back to CLINIC_TRANSITION_POLICY)
    #[arg(long, global = true)]
    policy: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the CLI can reach its services
    Health,
    /// List appointments
    List {
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        page_size: Option<i64>,
        /// Patient name substring
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        triage_status: Option<String>,
        #[arg(long)]
        visit_status: Option<String>,
    },
    /// Show one appointment as JSON
    Show { id: u64 },
    /// Register a patient
    Register {
        patient_name: String,
        patient_id_card: String,
        doctor_id: u64,
        department_id: u64,
        /// RFC 3339 timestamp, e.g. 2025-10-05T09:00:00Z
        appointment_time: DateTime<Utc>,
        phone: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Registrations for one id card number
    Patient { id_card: String },
    Confirm { id: u64 },
    Cancel { id: u64 },
    StartTriage { id: u64 },
    CompleteTriage {
        id: u64,
        #[arg(long)]
        room: Option<u64>,
        /// 1 (most urgent) to 5
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        notes: Option<String>,
    },
    SkipTriage { id: u64 },
    StartVisit { id: u64 },
    CompleteVisit {
        id: u64,
        #[arg(long)]
        diagnosis: Option<String>,
        #[arg(long)]
        prescription: Option<String>,
    },
    MissVisit { id: u64 },
    /// Registrations waiting for triage
    PendingTriage,
    /// Triaged registrations waiting to be seen
    PendingVisit,
    /// Admit a patient
    Admit {
        patient_name: String,
        doctor_name: String,
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        bed: Option<String>,
        #[arg(long)]
        diagnosis: Option<String>,
    },
    /// Discharge a patient and print the fee
    Discharge { id: u64 },
    /// List admissions
    Admissions {
        #[arg(long)]
        patient_name: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        page_size: Option<i64>,
    },
    /// Create the default administrator if it does not exist
    BootstrapAdmin {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Verify a username and password
    CheckLogin { username: String, password: String },
}

struct Services {
    cfg: CoreConfig,
    appointments: AppointmentService,
    admissions: AdmissionService,
    accounts: AccountService,
}

impl Services {
    fn open(data_dir: Option<PathBuf>, policy: Option<String>) -> Result<Self, Box<dyn Error>> {
        let data_dir = data_dir
            .or_else(|| std::env::var("CLINIC_DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let policy = policy.or_else(|| std::env::var("CLINIC_TRANSITION_POLICY").ok());
        let policy: TransitionPolicy = clinic_core::transition_policy_from_env_value(policy)?;
        let cfg = CoreConfig::new(data_dir, policy)?;

        Ok(Self {
            appointments: AppointmentService::new(
                Arc::new(JsonFileStore::<Appointment>::open(cfg.appointments_dir())?),
                &cfg,
            ),
            admissions: AdmissionService::new(
                Arc::new(JsonFileStore::<Admission>::open(cfg.admissions_dir())?),
                &cfg,
            ),
            accounts: AccountService::new(Arc::new(JsonFileStore::<UserAccount>::open(cfg.users_dir())?)),
            cfg,
        })
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let Some(command) = cli.command else {
        println!("Use 'clinic --help' for commands");
        return Ok(());
    };

    let services = Services::open(cli.data_dir, cli.policy)?;
    let appointments = &services.appointments;

    match command {
        Commands::Health => {
            println!(
                "{} (data: {}, policy: {})",
                HealthService::check_health().message,
                services.cfg.data_dir().display(),
                services.cfg.transition_policy()
            );
        }
        Commands::List {
            page,
            page_size,
            search,
            status,
            triage_status,
            visit_status,
        } => {
            let query = AppointmentQuery::from_raw(
                appointments.page_request(page, page_size),
                search,
                status.as_deref(),
                triage_status.as_deref(),
                visit_status.as_deref(),
            )?;
            let page = appointments.find_all(&query)?;
            print_appointments(&page.data);
            println!(
                "Page {} of {} ({} total)",
                page.pagination.page, page.pagination.total_pages, page.pagination.total
            );
        }
        Commands::Show { id } => print_json(&appointments.find_one(id)?)?,
        Commands::Register {
            patient_name,
            patient_id_card,
            doctor_id,
            department_id,
            appointment_time,
            phone,
            description,
        } => {
            let created = appointments.create(NewAppointment {
                patient_name: NonEmptyText::new(patient_name)?,
                patient_id_card: NonEmptyText::new(patient_id_card)?,
                doctor_id,
                department_id,
                appointment_time,
                phone: PhoneNumber::parse(phone)?,
                description,
                status: None,
                triage_status: None,
                visit_status: None,
            })?;
            println!("Registered appointment with ID: {}", created.id);
        }
        Commands::Patient { id_card } => {
            print_appointments(&appointments.find_by_patient_id_card(&id_card)?)
        }
        Commands::Confirm { id } => print_transition(appointments.confirm(id)?),
        Commands::Cancel { id } => print_transition(appointments.cancel(id)?),
        Commands::StartTriage { id } => print_transition(appointments.start_triage(id)?),
        Commands::CompleteTriage {
            id,
            room,
            priority,
            notes,
        } => {
            let outcome = TriageCompletion {
                room_id: room,
                priority: priority.map(Priority::new).transpose()?,
                triage_notes: notes,
            };
            print_transition(appointments.complete_triage(id, outcome)?)
        }
        Commands::SkipTriage { id } => print_transition(appointments.skip_triage(id)?),
        Commands::StartVisit { id } => print_transition(appointments.start_visit(id)?),
        Commands::CompleteVisit {
            id,
            diagnosis,
            prescription,
        } => {
            let outcome = VisitCompletion {
                diagnosis,
                prescription,
            };
            print_transition(appointments.complete_visit(id, outcome)?)
        }
        Commands::MissVisit { id } => print_transition(appointments.miss_visit(id)?),
        Commands::PendingTriage => print_appointments(&appointments.pending_triage()?),
        Commands::PendingVisit => print_appointments(&appointments.pending_visit()?),
        Commands::Admit {
            patient_name,
            doctor_name,
            room,
            bed,
            diagnosis,
        } => {
            let admitted = services.admissions.admit(NewAdmission {
                patient_name: NonEmptyText::new(patient_name)?,
                doctor_name: NonEmptyText::new(doctor_name)?,
                admission_time: None,
                diagnosis,
                treatment: None,
                room,
                bed,
                notes: None,
            })?;
            println!("Admitted with ID: {}", admitted.id);
        }
        Commands::Discharge { id } => {
            let discharged = services.admissions.discharge(id)?;
            println!(
                "Discharged admission {} at {}, fee: {}",
                discharged.id,
                discharged
                    .discharge_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
                discharged.price
            );
        }
        Commands::Admissions {
            patient_name,
            page,
            page_size,
        } => {
            let request = services.admissions.page_request(page, page_size);
            let page = services
                .admissions
                .find_all(request, patient_name.as_deref())?;
            print_admissions(&page.data);
        }
        Commands::BootstrapAdmin { username, password } => {
            let username = username.unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.into());
            let password = password.unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.into());
            match services
                .accounts
                .bootstrap_default_admin(&username, &password)?
            {
                BootstrapOutcome::Created => println!("Created administrator '{}'", username),
                BootstrapOutcome::AlreadyPresent => {
                    println!("Administrator '{}' already exists", username)
                }
            }
        }
        Commands::CheckLogin { username, password } => {
            let account = services.accounts.verify_credentials(&username, &password)?;
            println!("Credentials valid for '{}' ({})", account.username, account.role);
        }
    }

    Ok(())
}

fn print_appointments(appointments: &[Appointment]) {
    if appointments.is_empty() {
        println!("No appointments found.");
        return;
    }
    for a in appointments {
        println!(
            "ID: {}, Patient: {}, Time: {}, Status: {}/{}/{}",
            a.id,
            a.patient_name,
            a.appointment_time.to_rfc3339(),
            a.status,
            a.triage_status,
            a.visit_status
        );
    }
}

fn print_admissions(admissions: &[Admission]) {
    if admissions.is_empty() {
        println!("No admissions found.");
        return;
    }
    for a in admissions {
        println!(
            "ID: {}, Patient: {}, Doctor: {}, Admitted: {}, Status: {}, Price: {}",
            a.id,
            a.patient_name,
            a.doctor_name,
            a.admission_time.to_rfc3339(),
            a.status,
            a.price
        );
    }
}

fn print_transition(appointment: Appointment) {
    println!(
        "Appointment {} is now {}/{}/{}",
        appointment.id, appointment.status, appointment.triage_status, appointment.visit_status
    );
}

fn print_json(appointment: &Appointment) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(appointment)?);
    Ok(())
}
