use chrono::Utc;
use clap::Args;
use cohort_enroll::error::AppError;
use cohort_enroll::workflows::onboarding::{
    AllocationResult, ApplicantPayload, Cohort, CohortContext, DuplicatePolicy,
    EnrollmentAllocator, EnrollmentCandidate, EnrollmentRecord, EnrollmentSubmission,
    InMemoryEnrollmentRepository, StaticCohortSource,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Cohort type for the demo intake
    #[arg(long, default_value = "Placement")]
    pub(crate) cohort_type: String,
    /// Cohort number submissions must carry
    #[arg(long, default_value = "2.0")]
    pub(crate) cohort_number: String,
    /// First sequence number handed out in an empty cohort
    #[arg(long, default_value_t = 2501)]
    pub(crate) starting_number: u32,
    /// Number of distinct applicants to enroll
    #[arg(long, default_value_t = 3)]
    pub(crate) applicants: u32,
    /// Seed a prior cohort's identifier just past the demo range to show cohort closure
    #[arg(long)]
    pub(crate) seed_prior_cohort: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        cohort_type,
        cohort_number,
        starting_number,
        applicants,
        seed_prior_cohort,
    } = args;

    let today = Utc::now().date_naive();
    let context = CohortContext::new(Cohort::new(cohort_type, cohort_number), starting_number);

    let mut seeded = Vec::new();
    if seed_prior_cohort {
        let claimed = EnrollmentCandidate::new(today, starting_number.saturating_add(applicants));
        seeded.push(EnrollmentRecord {
            enrollment_id: claimed.identifier(),
            email: "alumni@example.com".to_string(),
            cohort: Cohort::new("Basic", "1.0"),
            payload: ApplicantPayload::default(),
            submitted_at: Utc::now(),
        });
    }

    let store = Arc::new(InMemoryEnrollmentRepository::with_records(seeded));
    let allocator = EnrollmentAllocator::new(
        store.clone(),
        Arc::new(StaticCohortSource::new(context.clone())),
        context.clone(),
        DuplicatePolicy::default(),
    );

    println!("Cohort enrollment demo");
    println!(
        "- active cohort {} | starting number {} | {} applicant(s)",
        context.cohort, context.starting_number, applicants
    );
    if seed_prior_cohort {
        for record in store.records() {
            println!(
                "- seeded {} for prior cohort {}",
                record.enrollment_id, record.cohort
            );
        }
    }

    println!("\nIntake");
    let submit = |email: &str| EnrollmentSubmission {
        cohort_number: context.cohort.number.clone(),
        email: email.to_string(),
        payload: ApplicantPayload {
            full_name: email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
            ..ApplicantPayload::default()
        },
    };

    for index in 1..=applicants {
        let email = format!("applicant{index}@example.com");
        render_outcome(&email, &allocator.allocate(submit(&email)));
    }

    println!("\nResubmission");
    render_outcome(
        "applicant1@example.com",
        &allocator.allocate(submit("applicant1@example.com")),
    );

    if seed_prior_cohort {
        println!("\nNext applicant after the prior cohort's range");
        let email = format!("applicant{}@example.com", applicants + 1);
        render_outcome(&email, &allocator.allocate(submit(&email)));
    }

    println!("\nStale client configuration");
    let mut stale = submit("late@example.com");
    stale.cohort_number = "0.0".to_string();
    render_outcome("late@example.com", &allocator.allocate(stale));

    println!("\n{} record(s) stored", store.len());
    Ok(())
}

fn render_outcome(email: &str, result: &AllocationResult) {
    match result {
        AllocationResult::Allocated(record) => {
            println!("- {email}: allocated {}", record.enrollment_id)
        }
        AllocationResult::Duplicate(existing) => {
            println!("- {email}: already enrolled as {existing}")
        }
        AllocationResult::CohortClosed {
            cohort,
            identifier,
            claimed_by,
        } => println!("- {email}: cohort {cohort} closed, {identifier} belongs to {claimed_by}"),
        AllocationResult::ConfigMismatch { expected, provided } => {
            println!("- {email}: cohort {provided} is stale, active cohort is {expected}")
        }
        AllocationResult::TransientFailure(cause) => {
            println!("- {email}: temporarily unavailable ({cause})")
        }
    }
}
