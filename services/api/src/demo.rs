use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;
use estate_leads::error::AppError;
use estate_leads::leads::{
    AgencyId, AgentId, InMemoryCrmStore, LeadPatch, LeadService, LeadStatus, NewLead,
    NewStatusOption, NotificationDispatcher, Patch, RecordingAlertTransport, RequestContext, Role,
    Subscription, UserId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the full audit trail for every lead touched by the demo.
    #[arg(long)]
    pub(crate) list_activities: bool,
    /// Skip the bulk-operation portion of the demo.
    #[arg(long)]
    pub(crate) skip_bulk: bool,
}

/// Walks a lead through the pipeline against the in-memory store and prints
/// the resulting audit trail and notification feed.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        list_activities,
        skip_bulk,
    } = args;

    let store = Arc::new(InMemoryCrmStore::default());
    let alerts = Arc::new(RecordingAlertTransport::default());
    let service = Arc::new(LeadService::new(store.clone(), alerts.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));

    let agency = AgencyId("agency-demo".to_string());
    let now = Utc::now();
    store.put_subscription(Subscription {
        agency_id: agency.clone(),
        users_limit: -1,
        prospects_limit: -1,
        properties_limit: -1,
        trial_start: now,
        trial_end: Some(now + Duration::days(30)),
    });

    let manager = RequestContext {
        user_id: UserId("user-dana".to_string()),
        role: Role::Manager,
        agency_id: agency.clone(),
    };
    let agent = AgentId("user-morgan".to_string());
    let agent_ctx = RequestContext {
        user_id: UserId(agent.0.clone()),
        role: Role::Member,
        agency_id: agency.clone(),
    };

    println!("Lead pipeline demo (tenant {})", agency.0);

    service.statuses().create(
        &manager,
        NewStatusOption {
            name: "viewing_booked".to_string(),
            translation: "Viewing booked".to_string(),
            color: "#0ea5e9".to_string(),
            order: 3,
        },
    )?;
    let options = service.statuses().list(&manager)?;
    println!("\nPipeline stages");
    for option in &options {
        let marker = if option.is_last_step { " (last step)" } else { "" };
        println!("- {} [{}]{}", option.translation, option.name, marker);
    }

    let lead = service.create_lead(
        &manager,
        NewLead {
            name: "Alex Rivera".to_string(),
            email: Some("alex.rivera@example.com".to_string()),
            phone: Some("+1-555-0134".to_string()),
            assigned_to: None,
            is_urgent: false,
        },
    )?;
    println!("\nIntake: {} ({})", lead.name, lead.id.0);

    let lead = service.update_lead(
        &manager,
        &lead.id,
        LeadPatch {
            assigned_to: Patch::Set(agent.clone()),
            ..LeadPatch::default()
        },
    )?;
    println!("Assigned to {}", agent.0);

    let lead = service.mark_contacted(&manager, &lead.id)?;
    println!(
        "First contact recorded at {}",
        lead.first_contacted_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "<unset>".to_string())
    );

    let lead = service.update_lead(
        &manager,
        &lead.id,
        LeadPatch {
            status: Some(LeadStatus::AppointmentScheduled),
            appointment_date: Patch::Set(now + Duration::days(3)),
            ..LeadPatch::default()
        },
    )?;
    service.add_note(
        &manager,
        &lead.id,
        "Viewing confirmed for the riverside unit.".to_string(),
    )?;
    let lead = service.update_lead(
        &manager,
        &lead.id,
        LeadPatch {
            status: Some(LeadStatus::Won),
            appointment_date: Patch::Clear,
            ..LeadPatch::default()
        },
    )?;
    println!("Closed as {}", lead.status.key());

    if !skip_bulk {
        println!("\nBulk reassignment");
        let mut batch = Vec::new();
        for name in ["Sam Okafor", "Priya Nair", "Jordan Lee"] {
            let created = service.create_lead(
                &manager,
                NewLead {
                    name: name.to_string(),
                    email: None,
                    phone: None,
                    assigned_to: None,
                    is_urgent: false,
                },
            )?;
            batch.push(created.id);
        }
        let affected = service.bulk_assign(&manager, &batch, &agent)?;
        println!("- {} leads handed to {}", affected, agent.0);
        let affected =
            service.bulk_update_status(&manager, &batch, LeadStatus::Contacted, None)?;
        println!("- {} leads moved to contacted", affected);
    }

    let feed = dispatcher.list_recent(&agent_ctx)?;
    println!(
        "\nNotification feed for {} ({} unread)",
        agent_ctx.user_id.0, feed.unread_count
    );
    for notification in &feed.notifications {
        println!("- {} -> {}", notification.message, notification.link);
    }

    if list_activities {
        println!("\nAudit trail for {}", lead.id.0);
        for activity in service.activities(&manager, &lead.id)? {
            println!("- [{}] {}", activity.created_at.to_rfc3339(), activity.details);
        }
    }

    println!(
        "\nExternal alerts dispatched: {}",
        alerts.deliveries().len()
    );

    Ok(())
}
