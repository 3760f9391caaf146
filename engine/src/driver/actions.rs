//! Policy and intervention application.
//!
//! One function per masterplan action, called by the yearly driver in its
//! fixed order. Every function validates the references its payload
//! carries (unknown ids are fatal) and records what it did in the event
//! log. Cost lookups read the value in force at the action date; cost
//! accumulation is returned to the driver, which books it per utility.

use std::collections::BTreeMap;

use crate::allocation::{custom_shares, greedy_by_priority, proportional_by_weight, PriorityRecipient};
use crate::assets::{DecommissionRegistry, Lifespan};
use crate::context::{NationalContext, UnknownReference};
use crate::core::settings::SimulationSettings;
use crate::core::time::year_start;
use crate::entities::jurisdictions::{MunicipalitySize, NrwClass};
use crate::entities::{raise_amount, PumpingStation, SolarFarm, SourceKind};
use crate::events::{EventLog, SimulationEvent};
use crate::masterplan::{
    AllocationRule, BudgetAllocationPolicy, CloseSourceItem, InstallPumpsItem, InstallSolarItem,
    NrwMitigationPolicy, NrwRule, OpenSourceItem, PricingPolicy, PricingRule,
    PumpInstallBehaviour,
};
use crate::rng::RandomStreamManager;
use crate::store::{tables, PropertyStore};
use crate::view::MunicipalityView;

use super::aging::seed_pipe_friction;
use super::engine::SimulationError;

/// The national budget split for one year: normalized fractions (used to
/// attribute national capex) and absolute amounts (each utility's share of
/// the national capital budget).
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetShares {
    pub fractions: BTreeMap<String, f64>,
    pub amounts: BTreeMap<String, f64>,
}

/// Split the yearly national budget across utilities.
///
/// With no policy in force, no money is distributed and national capex is
/// attributed equally; the missing-policy case resolves to "no action",
/// not an error.
pub fn share_national_budget(
    national: &NationalContext,
    store: &PropertyStore,
    settings: &SimulationSettings,
    policy: Option<&BudgetAllocationPolicy>,
    year: i32,
) -> Result<BudgetShares, SimulationError> {
    let ts = year_start(year);
    let utility_ids = national.utility_ids();
    let n = utility_ids.len();

    let equal = || -> BTreeMap<String, f64> {
        utility_ids
            .iter()
            .map(|id| (id.clone(), if n > 0 { 1.0 / n as f64 } else { 0.0 }))
            .collect()
    };

    let policy = match policy {
        Some(policy) => policy,
        None => {
            return Ok(BudgetShares {
                fractions: equal(),
                amounts: utility_ids.iter().map(|id| (id.clone(), 0.0)).collect(),
            })
        }
    };

    let fractions: BTreeMap<String, f64> = match policy.rule {
        AllocationRule::Custom => {
            let shares = policy.shares.as_ref().ok_or_else(|| {
                SimulationError::InvalidPolicy(
                    "budget_allocation with rule 'custom' requires explicit shares".to_string(),
                )
            })?;
            custom_shares(1.0, &utility_ids, shares)?
        }
        rule => {
            let mut weights: Vec<(String, f64)> = Vec::with_capacity(n);
            for id in &utility_ids {
                let utility = national.utility(id)?;
                let mut population = 0.0;
                let mut income_mass = 0.0;
                for municipality in utility.active_municipalities(&national.state, ts) {
                    let p = municipality.population(store, ts)?;
                    population += p;
                    income_mass += p * municipality.disposable_income(store, ts)?;
                }

                let weight = match rule {
                    AllocationRule::ByPopulation => population,
                    AllocationRule::ByInversePopulation => {
                        if population > 0.0 {
                            1.0 / population
                        } else {
                            0.0
                        }
                    }
                    AllocationRule::ByIncome => income_mass,
                    AllocationRule::ByInverseIncome => {
                        if income_mass > 0.0 {
                            1.0 / income_mass
                        } else {
                            0.0
                        }
                    }
                    AllocationRule::Custom => unreachable!("handled above"),
                };
                weights.push((id.clone(), weight));
            }
            proportional_by_weight(1.0, &weights)?
        }
    };

    let amounts = fractions
        .iter()
        .map(|(id, f)| (id.clone(), settings.national_budget * f))
        .collect();

    Ok(BudgetShares { fractions, amounts })
}

/// Install a pipe on a connection. Returns the capital cost
/// (unit cost at the install date × connection distance).
pub fn install_pipe_on_connection(
    national: &mut NationalContext,
    store: &mut PropertyStore,
    registry: &mut DecommissionRegistry,
    streams: &mut RandomStreamManager,
    settings: &SimulationSettings,
    events: &mut EventLog,
    connection_id: &str,
    pipe_option_id: &str,
    year: i32,
) -> Result<f64, SimulationError> {
    let option = national
        .catalog
        .pipe_option(pipe_option_id)
        .ok_or_else(|| UnknownReference::new("pipe option", pipe_option_id))?
        .clone();

    let install_date = year_start(year);
    let unit_cost = option.unit_cost(store, install_date)?;

    let mut sampler = streams.lifetime_sampler("pipes-lifetime", settings)?;
    let connection = national
        .connections
        .get_mut(connection_id)
        .ok_or_else(|| UnknownReference::new("connection", connection_id))?;

    let asset_id = connection
        .pipes
        .install(
            &option.id,
            option.lifetime,
            install_date,
            Lifespan::Sampled(&mut sampler),
            registry,
        )?
        .id()
        .to_string();
    let distance = connection.distance;

    seed_pipe_friction(store, &asset_id, install_date, option.dff_new)?;

    let cost = unit_cost * distance;
    events.record(SimulationEvent::PipeInstalled {
        year,
        connection_id: connection_id.to_string(),
        asset_id,
        option_id: option.id,
        cost,
    });

    Ok(cost)
}

/// Inspect a connection's active pipe; if it fails this year, replace it
/// in place. Returns the replacement cost (0 when nothing failed).
pub fn inspect_and_replace_pipe(
    national: &mut NationalContext,
    store: &mut PropertyStore,
    registry: &mut DecommissionRegistry,
    streams: &mut RandomStreamManager,
    settings: &SimulationSettings,
    events: &mut EventLog,
    connection_id: &str,
    year: i32,
) -> Result<f64, SimulationError> {
    let ts = year_start(year);

    // Peek at the active pipe to fetch its option before mutating.
    let (option_id, distance) = {
        let connection = national.connection(connection_id)?;
        match connection.active_pipe(registry, ts) {
            Some(pipe) => (pipe.option_id().to_string(), connection.distance),
            None => return Ok(0.0),
        }
    };
    let option = national
        .catalog
        .pipe_option(&option_id)
        .ok_or_else(|| UnknownReference::new("pipe option", &option_id))?
        .clone();
    let unit_cost = option.unit_cost(store, ts)?;

    let mut sampler = streams.lifetime_sampler("pipes-lifetime", settings)?;
    let connection = national
        .connections
        .get_mut(connection_id)
        .ok_or_else(|| UnknownReference::new("connection", connection_id))?;
    let replacement =
        match connection
            .pipes
            .replace_failing(year, option.lifetime, &mut sampler, registry)?
        {
            Some(replacement) => replacement,
            None => return Ok(0.0),
        };

    seed_pipe_friction(store, &replacement.new_asset_id, replacement.installed_at, option.dff_new)?;

    let cost = unit_cost * distance;
    events.record(SimulationEvent::AssetReplaced {
        year,
        container_id: connection_id.to_string(),
        failed_asset_id: replacement.failed_asset_id,
        new_asset_id: replacement.new_asset_id,
        replacement_cost: cost,
    });

    Ok(cost)
}

/// Inspect a station's active pump bank; if it fails this year, replace it
/// in place. Returns the replacement cost (0 when nothing failed).
pub fn inspect_and_replace_pumps(
    national: &mut NationalContext,
    store: &mut PropertyStore,
    registry: &mut DecommissionRegistry,
    streams: &mut RandomStreamManager,
    settings: &SimulationSettings,
    events: &mut EventLog,
    station_id: &str,
    year: i32,
) -> Result<f64, SimulationError> {
    let ts = year_start(year);

    let (option_id, pump_count) = {
        let station = national
            .stations
            .get(station_id)
            .ok_or_else(|| UnknownReference::new("pumping station", station_id))?;
        match station.active_pump_bank(registry, ts) {
            Some(bank) => (bank.option_id().to_string(), station.pump_count),
            None => return Ok(0.0),
        }
    };
    let option = national
        .catalog
        .pump_option(&option_id)
        .ok_or_else(|| UnknownReference::new("pump option", &option_id))?
        .clone();
    let unit_cost = option.unit_cost(store, ts)?;

    let mut sampler = streams.lifetime_sampler("pumps-lifetime", settings)?;
    let station = national
        .stations
        .get_mut(station_id)
        .ok_or_else(|| UnknownReference::new("pumping station", station_id))?;
    let replacement =
        match station
            .pumps
            .replace_failing(year, option.lifetime, &mut sampler, registry)?
        {
            Some(replacement) => replacement,
            None => return Ok(0.0),
        };

    let cost = unit_cost * pump_count as f64;
    events.record(SimulationEvent::AssetReplaced {
        year,
        container_id: station_id.to_string(),
        failed_asset_id: replacement.failed_asset_id,
        new_asset_id: replacement.new_asset_id,
        replacement_cost: cost,
    });

    Ok(cost)
}

/// Install a bank of pumps on the station serving a source. Returns the
/// capital cost (unit cost × pump count).
pub fn install_pump_bank(
    national: &mut NationalContext,
    store: &mut PropertyStore,
    registry: &mut DecommissionRegistry,
    streams: &mut RandomStreamManager,
    settings: &SimulationSettings,
    events: &mut EventLog,
    item: &InstallPumpsItem,
    year: i32,
) -> Result<f64, SimulationError> {
    let ts = year_start(year);

    let option = national
        .catalog
        .pump_option(&item.pump_option_id)
        .ok_or_else(|| UnknownReference::new("pump option", &item.pump_option_id))?
        .clone();
    let unit_cost = option.unit_cost(store, ts)?;

    let station_id = national.station_for_source(&item.source_id)?.id.clone();
    let has_active = {
        let station = &national.stations[&station_id];
        station.has_active_pumps(registry, ts)
    };
    if has_active && item.behaviour == PumpInstallBehaviour::New {
        return Err(SimulationError::InvalidPolicy(format!(
            "station {} already has an active pump bank; use 'replace'",
            station_id
        )));
    }

    let mut sampler = streams.lifetime_sampler("pumps-lifetime", settings)?;
    let station = national
        .stations
        .get_mut(&station_id)
        .ok_or_else(|| UnknownReference::new("pumping station", &station_id))?;
    let asset_id = station
        .pumps
        .install(
            &option.id,
            option.lifetime,
            ts,
            Lifespan::Sampled(&mut sampler),
            registry,
        )?
        .id()
        .to_string();
    station.pump_count = item.n_pumps;

    let cost = unit_cost * item.n_pumps as f64;
    events.record(SimulationEvent::PumpsInstalled {
        year,
        station_id,
        asset_id,
        option_id: option.id,
        n_pumps: item.n_pumps,
        cost,
    });

    Ok(cost)
}

/// Open a source: activate it, equip its station with pumps and its supply
/// connection with a pipe. Returns total capital cost.
pub fn open_source(
    national: &mut NationalContext,
    store: &mut PropertyStore,
    registry: &mut DecommissionRegistry,
    streams: &mut RandomStreamManager,
    settings: &SimulationSettings,
    events: &mut EventLog,
    item: &OpenSourceItem,
    year: i32,
) -> Result<f64, SimulationError> {
    let ts = year_start(year);

    let kind = national.source(&item.source_id)?.kind;
    let capacity = clamp_construction_size(settings_bounds(national, kind), item.source_capacity);

    let construction_unit_cost =
        store.get_latest_at_or_before(tables::SOURCE_UNIT_COST, ts, kind.name())?;

    let source = national
        .sources
        .get_mut(&item.source_id)
        .ok_or_else(|| UnknownReference::new("source", &item.source_id))?;
    source.open(ts, capacity)?;

    let construction_cost = construction_unit_cost * capacity;
    events.record(SimulationEvent::SourceOpened {
        year,
        source_id: item.source_id.clone(),
        capacity,
        cost: construction_cost,
    });

    // A source opened on a greenfield site gets its station created with
    // a deterministic id; existing stations are reused.
    if national.station_for_source(&item.source_id).is_err() {
        let station = PumpingStation::new(
            format!("PS-{}", item.source_id),
            item.source_id.clone(),
        );
        national.add_station(station)?;
    }

    let pumps_cost = install_pump_bank(
        national,
        store,
        registry,
        streams,
        settings,
        events,
        &InstallPumpsItem {
            source_id: item.source_id.clone(),
            pump_option_id: item.pump_option_id.clone(),
            n_pumps: item.n_pumps,
            behaviour: PumpInstallBehaviour::Replace,
        },
        year,
    )?;

    let supply_connection_id = national
        .connections
        .values()
        .find(|c| c.source_id() == Some(item.source_id.as_str()))
        .map(|c| c.id.clone())
        .ok_or_else(|| UnknownReference::new("supply connection for source", &item.source_id))?;
    let pipe_cost = install_pipe_on_connection(
        national,
        store,
        registry,
        streams,
        settings,
        events,
        &supply_connection_id,
        &item.pipe_option_id,
        year,
    )?;

    Ok(construction_cost + pumps_cost + pipe_cost)
}

fn settings_bounds(national: &NationalContext, kind: SourceKind) -> Option<(f64, f64)> {
    match kind {
        SourceKind::Groundwater => None,
        SourceKind::SurfaceWater => Some(national.sources_settings.surface_water_size_bounds),
        SourceKind::Desalination => Some(national.sources_settings.desalination_size_bounds),
    }
}

fn clamp_construction_size(bounds: Option<(f64, f64)>, requested: f64) -> f64 {
    match bounds {
        Some((low, high)) => requested.clamp(low, high),
        None => requested,
    }
}

/// Close a source. No capital cost.
pub fn close_source(
    national: &mut NationalContext,
    events: &mut EventLog,
    item: &CloseSourceItem,
    year: i32,
) -> Result<(), SimulationError> {
    let source = national
        .sources
        .get_mut(&item.source_id)
        .ok_or_else(|| UnknownReference::new("source", &item.source_id))?;
    source.close(year_start(year))?;

    events.record(SimulationEvent::SourceClosed {
        year,
        source_id: item.source_id.clone(),
    });
    Ok(())
}

/// Install a solar farm for a utility. Returns the capital cost
/// (panel unit cost × capacity).
pub fn install_solar_farm(
    national: &mut NationalContext,
    store: &PropertyStore,
    events: &mut EventLog,
    utility_id: &str,
    item: &InstallSolarItem,
    year: i32,
) -> Result<f64, SimulationError> {
    let ts = year_start(year);
    let unit_cost =
        store.get_latest_at_or_before(tables::SOLAR_PANEL_UNIT_COST, ts, &national.state.id)?;

    let farm_id = format!("SF-{}-{}", item.connected_entity_id, year);
    national.add_solar_farm(SolarFarm {
        id: farm_id.clone(),
        capacity: item.capacity,
        installation_date: ts,
        decommission_date: None,
        connected_entity_id: item.connected_entity_id.clone(),
    })?;

    national
        .utilities
        .get_mut(utility_id)
        .ok_or_else(|| UnknownReference::new("water utility", utility_id))?
        .solar_farm_ids
        .insert(farm_id.clone());

    let cost = unit_cost * item.capacity;
    events.record(SimulationEvent::SolarInstalled {
        year,
        farm_id,
        connected_entity_id: item.connected_entity_id.clone(),
        capacity: item.capacity,
        cost,
    });

    Ok(cost)
}

/// Spend an NRW mitigation budget on a utility's active municipalities.
/// Returns the budget actually spent.
pub fn apply_nrw_mitigation(
    national: &NationalContext,
    store: &mut PropertyStore,
    streams: &mut RandomStreamManager,
    events: &mut EventLog,
    utility_id: &str,
    policy: &NrwMitigationPolicy,
    year: i32,
) -> Result<f64, SimulationError> {
    let ts = year_start(year);
    let utility = national.utility(utility_id)?;
    let municipalities = utility.active_municipalities(&national.state, ts);

    // Snapshot everything the allocation and the spend need, in sorted
    // municipality order. Estimation is pure: it reads year-bound views
    // and mutates nothing.
    struct MuniInfo {
        id: String,
        age: f64,
        length: f64,
        population: f64,
        nrw_class: NrwClass,
        size_class: MunicipalitySize,
        unit_cost: f64,
    }

    let mut infos: Vec<MuniInfo> = Vec::with_capacity(municipalities.len());
    for municipality in &municipalities {
        let snapshot = MunicipalityView::new(municipality, store, year);
        let age = snapshot.network_age()?;
        let nrw_class = snapshot.nrw_class()?;
        let size_class = snapshot.size_class()?;
        let unit_cost = store.get_latest_at_or_before(
            tables::NRW_INTERVENTION_UNIT_COST,
            ts,
            &format!(
                "{}-{}-{}",
                national.state.id,
                nrw_class.name(),
                size_class.name()
            ),
        )?;
        infos.push(MuniInfo {
            id: municipality.id.clone(),
            age,
            length: snapshot.network_length()?,
            population: snapshot.population()?,
            nrw_class,
            size_class,
            unit_cost,
        });
    }

    let budget = policy.budget;
    let allocation = match policy.rule {
        NrwRule::ByNrwClass => {
            let recipients: Vec<PriorityRecipient> = infos
                .iter()
                .map(|info| PriorityRecipient {
                    id: info.id.clone(),
                    severity: info.nrw_class.severity(),
                    tiebreak: info.age,
                    // Reaching the class's lower age bound would keep the
                    // class unchanged, so one extra year is always bought.
                    full_cost: info.unit_cost
                        * ((info.age - info.nrw_class.age_bounds().0) + 1.0)
                        * info.length,
                })
                .collect();
            greedy_by_priority(budget, &recipients).0
        }
        NrwRule::ByPopulation => {
            let weights: Vec<(String, f64)> = infos
                .iter()
                .map(|info| (info.id.clone(), info.population))
                .collect();
            proportional_by_weight(budget, &weights)?
        }
        NrwRule::Custom => {
            let shares = policy.shares.as_ref().ok_or_else(|| {
                SimulationError::InvalidPolicy(
                    "nrw_mitigation with rule 'custom' requires explicit shares".to_string(),
                )
            })?;
            let ids: Vec<String> = infos.iter().map(|info| info.id.clone()).collect();
            custom_shares(budget, &ids, shares)?
        }
    };

    // Success is not guaranteed: one probability per (NRW class, size
    // class) pair per application, sampled in a fixed pair order.
    let bounds = national.nrw_settings.success_probability_bounds;
    let rng = streams.get_mut("nrw-success")?;
    let mut success: BTreeMap<(NrwClass, MunicipalitySize), f64> = BTreeMap::new();
    for nrw_class in [NrwClass::A, NrwClass::B, NrwClass::C, NrwClass::D, NrwClass::E] {
        for size_class in [
            MunicipalitySize::Small,
            MunicipalitySize::Medium,
            MunicipalitySize::Large,
        ] {
            success.insert((nrw_class, size_class), rng.uniform(bounds.0, bounds.1));
        }
    }

    let mut spent = 0.0;
    for (info, municipality) in infos.iter().zip(&municipalities) {
        let mut granted = allocation.get(&info.id).copied().unwrap_or(0.0);
        if granted <= 0.0 {
            continue;
        }
        if spent + granted > budget {
            granted = budget - spent;
        }
        spent += granted;

        // Years of age an ideal spend buys, discounted by the sampled
        // success probability, never below an age of zero.
        let ideal_years = granted / (info.unit_cost * info.length);
        let years_bought =
            (ideal_years * success[&(info.nrw_class, info.size_class)]).min(info.age);
        municipality.update_network_age(store, ts, -years_bought)?;
    }

    events.record(SimulationEvent::NrwBudgetSpent {
        year,
        utility_id: utility_id.to_string(),
        budget,
        spent,
    });

    Ok(spent)
}

/// Adjust a utility's water prices from the prior year's values.
pub fn apply_pricing_adjustment(
    national: &NationalContext,
    store: &mut PropertyStore,
    events: &mut EventLog,
    utility_id: &str,
    policy: &PricingPolicy,
    year: i32,
) -> Result<(), SimulationError> {
    let utility = national.utility(utility_id)?;

    // Prices are written yearly, so the values in force at year-1 are the
    // base for this year's adjustment.
    let last_year = year_start(year - 1);
    let (base_fixed, base_variable, base_selling) = utility.water_prices(store, last_year)?;

    let (fixed, variable, selling) = match policy.rule {
        PricingRule::ByInflation => {
            // Inflation is expressed in percentage points.
            let rate = national.inflation(store, year - 1)? / 100.0;
            (
                (1.0 + rate) * base_fixed,
                (1.0 + rate) * base_variable,
                (1.0 + rate) * base_selling,
            )
        }
        PricingRule::Custom => {
            let args = policy.args.ok_or_else(|| {
                SimulationError::InvalidPolicy(
                    "pricing_adjustment with rule 'custom' requires policy args".to_string(),
                )
            })?;
            (
                (1.0 + args.fixed_component) * base_fixed,
                (1.0 + args.variable_component) * base_variable,
                (1.0 + args.selling_price) * base_selling,
            )
        }
    };

    utility.set_water_prices(store, year_start(year), fixed, variable, selling)?;

    events.record(SimulationEvent::PricesAdjusted {
        year,
        utility_id: utility_id.to_string(),
        fixed,
        variable,
        selling,
    });

    Ok(())
}

/// Update a utility's financial balance for the year, raising a bond
/// issuance against the shortfall when a bond ratio is in force. Returns
/// the closing balance.
pub fn update_financial_balance(
    national: &mut NationalContext,
    store: &mut PropertyStore,
    events: &mut EventLog,
    utility_id: &str,
    bond_ratio: Option<f64>,
    capex: f64,
    year: i32,
) -> Result<f64, SimulationError> {
    let ts = year_start(year);
    let state_id = national.state.id.clone();

    let (previous, revenue, debt_service) = {
        let utility = national.utility(utility_id)?;

        let previous = match utility.balance(store, year_start(year - 1)) {
            Ok(balance) => balance,
            Err(crate::store::StoreError::NotFound { .. }) => 0.0,
            Err(e) => return Err(e.into()),
        };

        let (fixed, variable, _selling) = utility.water_prices(store, ts)?;
        let mut population = 0.0;
        let mut demand = 0.0;
        for municipality in utility.active_municipalities(&national.state, ts) {
            population += municipality.population(store, ts)?;
            demand += store.get(tables::MUNICIPALITY_DEMAND, ts, &municipality.id)?;
        }
        let revenue = fixed * population + variable * demand;

        (previous, revenue, utility.debt_service(year))
    };

    let mut balance = previous + revenue - capex - debt_service;

    if balance < 0.0 {
        if let Some(ratio) = bond_ratio {
            let target = -balance * ratio;
            let (raised, issuance) = raise_amount(
                store,
                &national.bonds_settings,
                &state_id,
                target,
                year,
                utility_id,
            )?;
            balance += raised;

            events.record(SimulationEvent::BondIssued {
                year,
                utility_id: utility_id.to_string(),
                issuance_id: issuance.id.clone(),
                raised,
            });
            national
                .utilities
                .get_mut(utility_id)
                .ok_or_else(|| UnknownReference::new("water utility", utility_id))?
                .bonds
                .push(issuance);
        }
    }

    store.set(tables::UTILITY_CAPEX, ts, utility_id, capex)?;
    national
        .utility(utility_id)?
        .set_balance(store, ts, balance)?;

    events.record(SimulationEvent::BalanceUpdated {
        year,
        utility_id: utility_id.to_string(),
        balance,
    });

    Ok(balance)
}
