//! Filter drawer.
//!
//! Every control reads its state from the shared [`GraphFilters`] signal and
//! writes back by producing a new filter object, so a reset or preset applied
//! anywhere re-syncs the whole drawer.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use leptos::ev;
use leptos::prelude::*;

use crate::builder::{GraphFilters, parse_story_date};
use crate::entities::EntityKind;

/// Which end of the timeline window a date input controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineBound {
	Start,
	End,
}

/// Value for an `<input type="date">` showing `bound`.
pub fn date_input_value(bound: Option<NaiveDateTime>) -> String {
	bound
		.map(|d| d.date().format("%Y-%m-%d").to_string())
		.unwrap_or_default()
}

/// Copy of `filters` with one timeline bound replaced by the raw input.
///
/// A blank or unreadable input removes the bound. A plain date closing the
/// window means the end of that day.
pub fn with_timeline(filters: &GraphFilters, bound: TimelineBound, raw: &str) -> GraphFilters {
	let raw = raw.trim();
	let parsed = match bound {
		TimelineBound::End => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
			.ok()
			.and_then(|d| d.and_hms_opt(23, 59, 59))
			.or_else(|| parse_story_date(raw)),
		TimelineBound::Start => parse_story_date(raw),
	};
	let mut next = filters.clone();
	match bound {
		TimelineBound::Start => next.timeline_start = parsed,
		TimelineBound::End => next.timeline_end = parsed,
	}
	next
}

/// Whether `group` is one of the selected groups.
pub fn group_selected(filters: &GraphFilters, group: &str) -> bool {
	filters.groups.as_ref().is_some_and(|g| g.contains(group))
}

/// Named filter presets offered by the drawer.
pub fn presets() -> [(&'static str, GraphFilters); 3] {
	[
		("Everything", GraphFilters::default()),
		("Characters only", GraphFilters::characters_only()),
		("Hide events", GraphFilters::without_events()),
	]
}

/// Side panel editing the active [`GraphFilters`].
///
/// `on_change` receives each new filter object; the owner stores it in
/// `filters` and applies it to the engine.
#[component]
pub fn FilterDrawer(
	filters: RwSignal<GraphFilters>,
	#[prop(into)] groups: Signal<BTreeSet<String>>,
	#[prop(into)] on_change: Callback<GraphFilters>,
) -> impl IntoView {
	let kinds = EntityKind::ALL
		.into_iter()
		.map(|kind| {
			let on_toggle = move |_: ev::Event| {
				on_change.run(filters.with_untracked(|f| f.toggled(kind)));
			};
			view! {
				<label class="story-graph-filter-kind">
					<input
						type="checkbox"
						prop:checked=move || filters.with(|f| f.includes(kind))
						on:change=on_toggle
					/>
					{kind.plural_label()}
				</label>
			}
		})
		.collect_view();

	let group_list = move || {
		let mut all = groups.get();
		// Selected groups stay listed even before any build has shown them.
		if let Some(selected) = filters.with(|f| f.groups.clone()) {
			all.extend(selected);
		}
		all.into_iter()
			.map(|group| {
				let checked_group = group.clone();
				let toggled_group = group.clone();
				view! {
					<label class="story-graph-filter-group">
						<input
							type="checkbox"
							prop:checked=move || filters.with(|f| group_selected(f, &checked_group))
							on:change=move |_| {
								on_change.run(filters.with_untracked(|f| f.toggled_group(&toggled_group)));
							}
						/>
						{group}
					</label>
				}
			})
			.collect_view()
	};

	let date_input = move |bound: TimelineBound| {
		let value = move || {
			filters.with(|f| {
				date_input_value(match bound {
					TimelineBound::Start => f.timeline_start,
					TimelineBound::End => f.timeline_end,
				})
			})
		};
		view! {
			<input
				type="date"
				prop:value=value
				on:change=move |ev| {
					let raw = event_target_value(&ev);
					on_change.run(filters.with_untracked(|f| with_timeline(f, bound, &raw)));
				}
			/>
		}
	};

	let preset_buttons = presets()
		.into_iter()
		.map(|(title, preset)| {
			let active_preset = preset.clone();
			view! {
				<button
					class=move || {
						if filters.with(|f| *f == active_preset) {
							"story-graph-preset active"
						} else {
							"story-graph-preset"
						}
					}
					on:click=move |_| on_change.run(preset.clone())
				>
					{title}
				</button>
			}
		})
		.collect_view();

	view! {
		<aside class="story-graph-filters">
			<section>
				<h4>"Presets"</h4>
				<div class="story-graph-presets">{preset_buttons}</div>
			</section>
			<section>
				<h4>"Entity types"</h4>
				{kinds}
			</section>
			<section>
				<h4>"Groups"</h4>
				{move || {
					let empty = groups.with(BTreeSet::is_empty)
						&& filters.with(|f| f.groups.is_none());
					empty.then(|| view! { <p class="story-graph-muted">"No groups"</p> })
				}}
				{group_list}
			</section>
			<section>
				<h4>"Timeline"</h4>
				<label>"From " {date_input(TimelineBound::Start)}</label>
				<label>"To " {date_input(TimelineBound::End)}</label>
			</section>
			<button
				class="story-graph-reset"
				disabled=move || filters.with(|f| !f.is_active())
				on:click=move |_| on_change.run(GraphFilters::default())
			>
				"Reset filters"
			</button>
		</aside>
	}
}
