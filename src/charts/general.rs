use hashbrown::HashMap;
use plotters::{
    prelude::{BitMapBackend, Circle, EmptyElement, IntoDrawingArea},
    series::{AreaSeries, LineSeries, PointSeries},
    style::{Color, BLUE, GREEN, RED, WHITE, YELLOW},
};

use crate::types::Data;

fn y_bounds(data: &[&Data]) -> (f64, f64) {
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for series in data {
        for value in series.iter() {
            y_min = y_min.min(*value);
            y_max = y_max.max(*value);
        }
    }

    if y_min == y_max {
        y_max = y_min + 1.;
    }

    (y_min, y_max)
}

pub fn simple_chart(dir: &str, name: &str, data: &Data) -> Result<(), Box<dyn std::error::Error>> {
    if data.is_empty() {
        return Ok(());
    }

    let path = format!("{dir}/{name}.png");
    let root = BitMapBackend::new(&path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let (y_min, y_max) = y_bounds(&[data]);

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption(name, ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0..data.len() as u32, y_min..y_max)?;

    chart.configure_mesh().light_line_style(WHITE).draw()?;

    chart.draw_series(LineSeries::new(
        data.iter()
            .enumerate()
            .map(|(index, value)| (index as u32, *value)),
        &BLUE,
    ))?;

    root.present()
        .expect("unable to write chart to file, perhaps there is no directory");

    Ok(())
}

/// Price series with buy and sell markers at the timesteps trades happened
pub fn buy_sell_chart(
    dir: &str,
    prices: &Data,
    buy_indexes: &HashMap<usize, f64>,
    sell_indexes: &HashMap<usize, f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if prices.is_empty() {
        return Ok(());
    }

    let path = format!("{dir}/buy_sell.png");
    let root = BitMapBackend::new(&path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let (y_min, y_max) = y_bounds(&[prices]);

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption("Buy Sell Chart", ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0..prices.len() as u32, y_min * 0.9..y_max * 1.1)?;

    chart.configure_mesh().light_line_style(WHITE).draw()?;

    // Price
    chart.draw_series(
        AreaSeries::new(
            prices
                .iter()
                .enumerate()
                .map(|(index, value)| (index as u32, *value)),
            0.0,
            BLUE.mix(0.2),
        )
        .border_style(BLUE),
    )?;

    // Sells
    chart.draw_series(PointSeries::of_element(
        sell_indexes
            .iter()
            .map(|(index, _)| (*index as u32, prices[*index])),
        5,
        YELLOW.filled(),
        &|coord, size, style| EmptyElement::at(coord) + Circle::new((0, 0), size, style),
    ))?;

    // Buys
    chart.draw_series(PointSeries::of_element(
        buy_indexes
            .iter()
            .map(|(index, _)| (*index as u32, prices[*index])),
        5,
        GREEN.filled(),
        &|coord, size, style| EmptyElement::at(coord) + Circle::new((0, 0), size, style),
    ))?;

    root.present()
        .expect("unable to write chart to file, perhaps there is no directory");

    Ok(())
}

pub fn assets_chart(dir: &str, total: &Data, cash: &Data) -> Result<(), Box<dyn std::error::Error>> {
    if total.is_empty() {
        return Ok(());
    }

    let path = format!("{dir}/assets.png");
    let root = BitMapBackend::new(&path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let (_, y_max) = y_bounds(&[total, cash]);

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption("Assets: Total; Cash", ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0..total.len() as u32, 0.0..y_max * 1.1)?;

    chart.configure_mesh().light_line_style(WHITE).draw()?;

    chart.draw_series(
        AreaSeries::new(
            total
                .iter()
                .enumerate()
                .map(|(index, value)| (index as u32, *value)),
            0.0,
            BLUE.mix(0.2),
        )
        .border_style(BLUE),
    )?;

    chart.draw_series(
        AreaSeries::new(
            cash.iter()
                .enumerate()
                .map(|(index, value)| (index as u32, *value)),
            0.0,
            GREEN.mix(0.2),
        )
        .border_style(GREEN),
    )?;

    root.present()
        .expect("unable to write chart to file, perhaps there is no directory");

    Ok(())
}

pub fn reward_chart(dir: &str, rewards: &Data) -> Result<(), Box<dyn std::error::Error>> {
    if rewards.is_empty() {
        return Ok(());
    }

    let path = format!("{dir}/rewards.png");
    let root = BitMapBackend::new(&path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let (y_min, y_max) = y_bounds(&[rewards]);

    let mut chart = plotters::chart::ChartBuilder::on(&root)
        .caption("Step Rewards", ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(0..rewards.len() as u32, y_min..y_max)?;

    chart.configure_mesh().light_line_style(WHITE).draw()?;

    chart.draw_series(LineSeries::new(
        rewards
            .iter()
            .enumerate()
            .map(|(index, value)| (index as u32, *value)),
        &RED,
    ))?;

    root.present()
        .expect("unable to write chart to file, perhaps there is no directory");

    Ok(())
}
