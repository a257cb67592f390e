//! Toolbar wiring controls to engine operations.

use leptos::ev;
use leptos::prelude::*;
use log::info;

use crate::components::force_graph::{
	EdgeLabelMode, EngineHandle, ExportFormat, GraphEngine, LayoutName,
};

/// Search box, layout picker and view controls.
#[component]
pub fn Toolbar(
	engine: StoredValue<EngineHandle, LocalStorage>,
	layout: RwSignal<LayoutName>,
	drawer_open: RwSignal<bool>,
	#[prop(into)] filters_active: Signal<bool>,
	#[prop(into)] on_refresh: Callback<()>,
	#[prop(optional_no_strip)] on_close: Option<Callback<()>>,
) -> impl IntoView {
	let search = RwSignal::new(String::new());
	let edge_labels = RwSignal::new(EdgeLabelMode::default());
	let run = move |f: fn(&mut GraphEngine)| {
		engine.with_value(|h| h.with(f));
	};

	let on_search = move |term: String| {
		engine.with_value(|h| h.with(|e| e.schedule_search(&term)));
		search.set(term);
	};

	let on_clear_search = move |_: ev::MouseEvent| {
		search.set(String::new());
		run(|e| e.clear_search());
	};

	let on_layout = move |ev: ev::Event| {
		let name = event_target_value(&ev);
		let changed = engine
			.with_value(|h| h.with(|e| e.change_layout(&name).then(|| e.layout())))
			.flatten();
		if let Some(next) = changed {
			layout.set(next);
		}
	};

	let on_labels = move |_: ev::MouseEvent| {
		if let Some(mode) = engine.with_value(|h| h.with(|e| e.toggle_edge_labels())) {
			edge_labels.set(mode);
		}
	};

	let export = move |format: ExportFormat| {
		let exported = engine.with_value(|h| h.with(|e| e.export_as_image(format)));
		if let Some(Ok(filename)) = exported {
			info!("story-graph: exported {filename}");
		}
	};

	let layout_options = LayoutName::ALL
		.into_iter()
		.map(|name| {
			view! {
				<option value=name.as_str() selected=move || layout.get() == name>
					{name.title()}
				</option>
			}
		})
		.collect_view();

	view! {
		<div class="story-graph-toolbar">
			<div class="story-graph-search">
				<input
					type="search"
					placeholder="Search entities"
					prop:value=move || search.get()
					on:input=move |ev| on_search(event_target_value(&ev))
				/>
				{move || (!search.with(String::is_empty)).then(|| view! {
					<button title="Clear search" on:click=on_clear_search>"×"</button>
				})}
			</div>

			<select title="Layout" on:change=on_layout prop:value=move || layout.get().as_str()>
				{layout_options}
			</select>

			<div class="story-graph-zoom-controls">
				<button title="Zoom in" on:click=move |_| run(|e| e.zoom_in())>"+"</button>
				<button title="Zoom out" on:click=move |_| run(|e| e.zoom_out())>"−"</button>
				<button title="Fit to view" on:click=move |_| run(|e| e.fit_to_view())>"Fit"</button>
			</div>

			<button
				class=move || {
					if edge_labels.get() == EdgeLabelMode::Always { "active" } else { "" }
				}
				title="Toggle relationship labels"
				on:click=on_labels
			>
				"Labels"
			</button>

			<button
				class=move || {
					match (drawer_open.get(), filters_active.get()) {
						(true, _) => "active",
						(false, true) => "filtered",
						_ => "",
					}
				}
				title="Filters"
				on:click=move |_| drawer_open.update(|open| *open = !*open)
			>
				"Filters"
			</button>

			<button title="Export as PNG" on:click=move |_| export(ExportFormat::Png)>"PNG"</button>
			<button title="Export as JPEG" on:click=move |_| export(ExportFormat::Jpeg)>"JPEG"</button>
			<button title="Refresh" on:click=move |_| on_refresh.run(())>"Refresh"</button>

			{on_close.map(|close| view! {
				<button class="story-graph-close" title="Close" on:click=move |_| close.run(())>"×"</button>
			})}
		</div>
	}
}
