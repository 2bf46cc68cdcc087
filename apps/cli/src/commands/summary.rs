//! Human-readable trip output.

use std::path::Path;

use colored::Colorize;
use triply_core::{ItineraryPlace, TripRecord};

fn place_line(place: &ItineraryPlace) -> String {
    let mut line = place.name.clone();
    if let Some(ref price) = place.price {
        line.push_str(&format!(" {}", price.dimmed()));
    }
    if let Some(rating) = place.rating {
        line.push_str(&format!(" {}", format!("★ {:.1}", rating).yellow()));
    }
    line
}

pub fn print_trip(trip: &TripRecord) {
    println!();
    println!("{}", trip.title.bold().cyan());

    let location: Vec<&str> =
        [trip.city.as_str(), trip.country.as_str()].into_iter().filter(|s| !s.is_empty()).collect();
    if !location.is_empty() {
        println!("  {} {}", "Where:".dimmed(), location.join(", "));
    }
    if !trip.duration.is_empty() {
        println!("  {} {}", "Duration:".dimmed(), trip.duration);
    }
    if !trip.price.is_empty() {
        println!("  {} {}", "Estimated:".dimmed(), trip.price.green());
    }
    if !trip.description.is_empty() {
        println!();
        println!("  {}", trip.description);
    }

    for day in &trip.itinerary {
        println!();
        println!("  {} {}", format!("Day {}", day.day).bold(), day.title);
        for place in &day.places {
            println!("    {} {}", "•".cyan(), place_line(place));
        }
        for restaurant in &day.restaurants {
            println!("    {} {}", "🍴".dimmed(), place_line(restaurant));
        }
    }

    println!();
    println!(
        "  {} {} places, {} restaurants",
        "✓".green(),
        trip.place_count(),
        trip.restaurant_count()
    );
}

pub fn print_saved(path: &Path) {
    println!("  {} Saved trip to {}", "✓".green(), path.display().to_string().cyan());
}
