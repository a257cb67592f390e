//! Presentation shells hosting one graph engine each.
//!
//! A shell lays out the chrome (toolbar, filter drawer, legend, detail panel
//! and status bar) around a [`GraphCanvas`] and routes engine events into a
//! [`ShellStatus`]. Mounting a shell creates its engine; unmounting it
//! destroys that engine once, through the canvas cleanup.

mod details;
mod filters;
mod status;
mod toolbar;

use leptos::ev;
use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, warn};

use crate::builder::GraphFilters;
use crate::config::GraphConfig;
use crate::error::GraphError;

use super::force_graph::{
	EngineHandle, GraphCanvas, GraphEvent, GraphSources, Theme,
};

pub use details::DetailPanel;
pub use filters::{FilterDrawer, TimelineBound, date_input_value, presets, with_timeline};
pub use status::{GraphSummary, Legend, NoticeBanner, ShellStatus, StatusBar};
pub use toolbar::Toolbar;

/// Container chrome a shell renders in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShellKind {
	/// Overlay above the host page, closed through `on_close`.
	Modal,
	/// Inline view filling its parent.
	#[default]
	Panel,
}

impl ShellKind {
	/// Inline style guaranteeing the container a measurable size before the
	/// engine mounts.
	pub fn container_style(self) -> &'static str {
		match self {
			ShellKind::Modal => {
				"display: flex; flex-direction: column; width: 90vw; height: 85vh; min-width: 320px; min-height: 240px;"
			}
			ShellKind::Panel => {
				"display: flex; flex-direction: column; width: 100%; height: 100%; min-height: 480px;"
			}
		}
	}

	pub fn class(self) -> &'static str {
		match self {
			ShellKind::Modal => "story-graph-shell story-graph-modal",
			ShellKind::Panel => "story-graph-shell story-graph-panel",
		}
	}
}

fn report(result: Result<bool, GraphError>) {
	match result {
		Ok(committed) => debug!("story-graph: refresh committed: {committed}"),
		Err(GraphError::Destroyed) => debug!("story-graph: refresh after close ignored"),
		Err(e) => warn!("story-graph: refresh failed: {e}"),
	}
}

/// A complete graph view: toolbar, filter drawer, canvas and status bar.
#[component]
pub fn GraphShell(
	kind: ShellKind,
	sources: GraphSources,
	#[prop(optional)] config: GraphConfig,
	#[prop(optional)] filters: GraphFilters,
	#[prop(optional)] theme: Option<Theme>,
	/// Title shown in the modal header.
	#[prop(into, optional)]
	title: Option<String>,
	#[prop(into, optional)] on_close: Option<Callback<()>>,
) -> impl IntoView {
	let handle = EngineHandle::default();
	let engine = StoredValue::new_local(handle.clone());
	let theme = theme.unwrap_or_default();
	let status = RwSignal::new(ShellStatus::default());
	let layout = RwSignal::new(config.default_layout);
	let filter_state = RwSignal::new(filters.clone());
	let drawer_open = RwSignal::new(false);
	let filters_active = Signal::derive(move || filter_state.with(GraphFilters::is_active));

	let on_event = Callback::new(move |event: GraphEvent| {
		let summary = match event {
			GraphEvent::Rebuilt { .. } => engine
				.with_value(|h| h.with(|e| GraphSummary::of(e))),
			_ => None,
		};
		status.update(|s| s.apply(event, summary));
	});

	let on_error = Callback::new(move |message: String| {
		status.update(|s| s.fail(message));
	});

	let on_refresh = Callback::new(move |()| {
		let handle = engine.get_value();
		spawn_local(async move { report(handle.refresh().await) });
	});

	let on_filters = Callback::new(move |next: GraphFilters| {
		filter_state.set(next.clone());
		let handle = engine.get_value();
		spawn_local(async move { report(handle.apply_filters(next).await) });
	});

	let details = Signal::derive(move || status.with(|s| s.details.clone()));
	let groups = Signal::derive(move || status.with(|s| s.known_groups.clone()));
	let legend_theme = theme.clone();

	let body = view! {
		<Toolbar
			engine=engine
			layout=layout
			drawer_open=drawer_open
			filters_active=filters_active
			on_refresh=on_refresh
			on_close=on_close
		/>
		<div class="story-graph-body" style="display: flex; flex: 1; min-height: 0;">
			<Show when=move || drawer_open.get()>
				<FilterDrawer filters=filter_state groups=groups on_change=on_filters />
			</Show>
			<div
				class="story-graph-stage"
				style="position: relative; flex: 1; min-width: 200px; min-height: 200px; overflow: hidden;"
			>
				<GraphCanvas
					handle=handle
					sources=sources
					config=config
					filters=filters
					theme=theme
					on_event=on_event
					on_error=on_error
				/>
				<Legend status=status theme=legend_theme />
				<DetailPanel details=details engine=engine />
				<NoticeBanner status=status />
			</div>
		</div>
		<StatusBar status=status filters_active=filters_active />
	};

	match kind {
		ShellKind::Modal => {
			let close = move |_: ev::MouseEvent| {
				if let Some(close) = on_close {
					close.run(());
				}
			};
			view! {
				<div
					class="story-graph-backdrop"
					style="position: fixed; inset: 0; display: flex; align-items: center; justify-content: center; background: rgba(0, 0, 0, 0.5); z-index: 100;"
					on:click=close
				>
					<div
						class=kind.class()
						style=kind.container_style()
						role="dialog"
						on:click=|ev: ev::MouseEvent| ev.stop_propagation()
					>
						{title.map(|title| view! { <h2 class="story-graph-title">{title}</h2> })}
						{body}
					</div>
				</div>
			}
			.into_any()
		}
		ShellKind::Panel => view! {
			<div class=kind.class() style=kind.container_style()>
				{title.map(|title| view! { <h2 class="story-graph-title">{title}</h2> })}
				{body}
			</div>
		}
		.into_any(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn containers_always_have_a_size() {
		for kind in [ShellKind::Modal, ShellKind::Panel] {
			let style = kind.container_style();
			assert!(style.contains("height:"), "{kind:?}");
			assert!(style.contains("min-height:"), "{kind:?}");
		}
	}

	#[test]
	fn panel_is_the_default_shell() {
		assert_eq!(ShellKind::default(), ShellKind::Panel);
		assert!(ShellKind::Modal.class().contains("story-graph-modal"));
	}
}
