//! Physical aging.
//!
//! At the end of year t (except the terminal year), the time-varying
//! physical properties advance by one year: active pipes accumulate
//! friction-factor decay, and the inner distribution networks of
//! municipalities that survive into t+1 grow one year older. A pipe that
//! is replaced at t+1 is skipped: its last year is already behind it, and
//! its successor starts from the option's fresh friction factor.

use chrono::NaiveDate;

use crate::assets::DecommissionRegistry;
use crate::context::{NationalContext, UnknownReference};
use crate::core::settings::SimulationSettings;
use crate::core::time::year_start;
use crate::events::{EventLog, SimulationEvent};
use crate::rng::RandomStreamManager;
use crate::store::{tables, PropertyStore};
use crate::view::UtilityView;

use super::engine::SimulationError;

/// Age the friction factor of every active pipe that survives into
/// `year + 1`, in sorted connection order. Returns the number of pipes
/// aged.
///
/// Each pipe's yearly decay is sampled uniformly from its option's decay
/// bounds via the `pipes-friction-decay` stream; the sorted iteration
/// order makes the sample sequence reproducible.
pub fn age_pipes(
    national: &NationalContext,
    store: &mut PropertyStore,
    registry: &DecommissionRegistry,
    streams: &mut RandomStreamManager,
    year: i32,
) -> Result<usize, SimulationError> {
    let this_year = year_start(year);
    let next_year = year_start(year + 1);

    // Collect first: (pipe id, decay bounds), sorted by connection id via
    // the ordered connection map.
    let mut to_age: Vec<(String, (f64, f64))> = Vec::new();
    for connection in national.connections.values() {
        let pipe = match connection.active_pipe(registry, this_year) {
            Some(pipe) => pipe,
            None => continue,
        };

        // If the pipe is replaced next year, this was its last year.
        let survives = connection
            .active_pipe(registry, next_year)
            .map_or(false, |next| next.id() == pipe.id());
        if !survives {
            continue;
        }

        let option = national
            .catalog
            .pipe_option(pipe.option_id())
            .ok_or_else(|| UnknownReference::new("pipe option", pipe.option_id()))?;
        to_age.push((pipe.id().to_string(), option.dff_decay_rate));
    }

    let rng = streams.get_mut("pipes-friction-decay")?;
    let mut decays = Vec::with_capacity(to_age.len());
    for (_, (low, high)) in &to_age {
        decays.push(rng.uniform(*low, *high));
    }

    for ((pipe_id, _), decay) in to_age.iter().zip(&decays) {
        let base = store.get_latest_at_or_before(tables::PIPE_FRICTION_FACTOR, this_year, pipe_id)?;
        store.set(tables::PIPE_FRICTION_FACTOR, next_year, pipe_id, base + decay)?;
    }

    Ok(to_age.len())
}

/// Age the inner distribution networks of every utility's municipalities.
///
/// Closures are detected by comparing the active-municipality sets of the
/// year-t and year-t+1 views: a municipality active now but not next year
/// stops advancing (its history stays intact); survivors get one more
/// year of age and carry their network length forward.
pub fn age_distribution_networks(
    national: &NationalContext,
    store: &mut PropertyStore,
    year: i32,
) -> Result<usize, SimulationError> {
    let this_year = year_start(year);
    let next_year = year_start(year + 1);

    let mut aged = 0;
    for utility in national.utilities.values() {
        let now = UtilityView::new(utility, &national.state, store, year);
        let next = UtilityView::new(utility, &national.state, store, year + 1);

        let active_now = now.active_municipality_ids();
        let active_next = next.active_municipality_ids();

        let survivors: Vec<&String> = active_now
            .iter()
            .filter(|id| active_next.contains(id))
            .collect();

        let mut updates: Vec<(String, f64, f64)> = Vec::with_capacity(survivors.len());
        for municipality_id in survivors {
            let age = store.get_latest_at_or_before(
                tables::MUNICIPALITY_NETWORK_AGE,
                this_year,
                municipality_id,
            )?;
            let length = store.get_latest_at_or_before(
                tables::MUNICIPALITY_NETWORK_LENGTH,
                this_year,
                municipality_id,
            )?;
            updates.push((municipality_id.clone(), age + 1.0, length));
        }

        for (municipality_id, age, length) in updates {
            store.set(
                tables::MUNICIPALITY_NETWORK_AGE,
                next_year,
                &municipality_id,
                age,
            )?;
            store.set(
                tables::MUNICIPALITY_NETWORK_LENGTH,
                next_year,
                &municipality_id,
                length,
            )?;
            aged += 1;
        }
    }

    Ok(aged)
}

/// Run both aging passes and log the event. `when` is the aged year.
pub fn age_system(
    national: &NationalContext,
    store: &mut PropertyStore,
    registry: &DecommissionRegistry,
    streams: &mut RandomStreamManager,
    settings: &SimulationSettings,
    events: &mut EventLog,
    when: i32,
) -> Result<(), SimulationError> {
    debug_assert!(!settings.timeline().is_terminal(when));

    let pipes_aged = age_pipes(national, store, registry, streams, when)?;
    age_distribution_networks(national, store, when)?;

    events.record(SimulationEvent::NetworksAged {
        year: when,
        pipes_aged,
    });
    Ok(())
}

/// Installation-time friction factor write for a freshly installed pipe.
pub fn seed_pipe_friction(
    store: &mut PropertyStore,
    pipe_id: &str,
    installed_at: NaiveDate,
    dff_new: f64,
) -> Result<(), SimulationError> {
    store.set(tables::PIPE_FRICTION_FACTOR, installed_at, pipe_id, dff_new)?;
    Ok(())
}
